//! Image processing: resize policy, operations, and the pixel backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from the bytes) |
//! | **Resize** | planned by [`calculations`], executed via `resize_exact` / `resize_to_fill` |
//! | **Watermark** | `font8x8` glyphs, `imageproc` rotation, `imageops::overlay` |
//! | **Blur** | separable Gaussian, `imageproc::filter` |
//! | **Encode** | `image::codecs::*` |
//!
//! The module is split into:
//! - **Calculations**: Resize policy engine, pure geometry planning (unit testable)
//! - **Parameters**: Data structures describing backend calls
//! - **Format**: Container types and output format resolution
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
mod format;
pub mod operations;
mod params;
pub mod rust_backend;
mod watermark;

pub use backend::{BackendError, Dimensions, Encoded, ImageBackend};
pub use calculations::{GeometryStep, SourceGeometry, plan_resize};
pub use format::{ImageType, OutputFormat, resolve_output_format};
pub use params::{
    Background, ExtendStrategy, Interesting, Kernel, Quality, Rgb, SizeMode, WatermarkParams,
};
pub use rust_backend::{DEFAULT_MAX_OUTPUT_PIXELS, RustBackend, RustImage};
