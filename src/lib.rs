//! # OSS Image Process
//!
//! An HTTP image transformation service. Clients POST an image together with
//! an `x-oss-process` descriptor such as
//! `image/resize,m_fill,w_200,h_200/watermark,text_SGk/format,webp` and get
//! the transformed image back, or a JSON metadata document for `image/info`.
//!
//! # Request Flow
//!
//! ```text
//! body ──► BufferPool ──► descriptor::parse ──► pipeline::plan ──► decode
//!                                                                   │
//!     response ◄── encode ◄── resize / watermark / blur (in order) ◄┘
//! ```
//!
//! Every option of every step is parsed before the image is decoded, so a bad
//! descriptor never costs a decode. `info` short-circuits after decode.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`descriptor`] | Splits `image/op,k_v/op2` into ordered operations |
//! | [`options`] | Typed options per operation: resize, watermark, blur, format |
//! | [`pipeline`] | Plans a descriptor into steps and runs them on a backend |
//! | [`imaging`] | Backend trait, resize geometry, the pure-Rust backend |
//! | [`server`] | axum routes, body limits, timeouts, JSON errors |
//! | [`runtime`] | Bounded rayon worker pool shared by all requests |
//! | [`buffer_pool`] | Reusable request body buffers |
//! | [`config`] | `config.toml` loading, stock defaults, validation |
//! | [`logging`] | tracing subscriber setup |
//! | [`error`] | Error taxonomy and the JSON error body |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Pixel Work Off the Executor
//!
//! Decoding, resampling, and encoding are CPU-bound. They run on a dedicated
//! rayon pool sized by `backend.concurrency_level`, and async handlers await
//! the result. The tokio workers only move bytes.
//!
//! ## Backend Behind a Trait
//!
//! [`imaging::ImageBackend`] names exactly the primitives the pipeline needs.
//! Geometry (which scale, which crop, which canvas) is decided by pure
//! functions in `imaging::calculations` and replayed through the trait, so the
//! resize policy is tested against a recording mock without touching pixels.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging::RustBackend`] uses the `image` crate for codecs and
//! resampling and `imageproc` for rotation. No system libraries are needed.

pub mod buffer_pool;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod runtime;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
