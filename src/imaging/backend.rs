//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the capability set the core needs from a
//! pixel library: decode into a handle, inspect it, mutate it in place, encode
//! it. Handles are owned by exactly one request and released with
//! [`ImageBackend::close`] when the request ends, whatever the outcome.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! [`MockBackend`](tests::MockBackend) below, which simulates geometry and
//! records every call.

use super::format::{ImageType, OutputFormat};
use super::params::{Background, Interesting, Kernel, Quality, SizeMode, WatermarkParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    /// The requested result exceeds the backend's output limit.
    #[error("Image too large: {0}")]
    TooLarge(String),
}

/// Width and height of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Output of an encode: the bytes plus what they turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub format: ImageType,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// All mutating calls operate on the handle in place. Calls on one handle are
/// sequential; the backend is free to parallelize inside a single call.
pub trait ImageBackend: Sync {
    type Handle: Send;

    /// Decode raw bytes. Malformed input fails with [`BackendError::Decode`].
    fn load_from_buffer(&self, bytes: &[u8]) -> Result<Self::Handle, BackendError>;

    fn width(&self, image: &Self::Handle) -> u32;

    fn height(&self, image: &Self::Handle) -> u32;

    fn format(&self, image: &Self::Handle) -> ImageType;

    fn has_alpha(&self, image: &Self::Handle) -> bool;

    /// Uniform resize by `scale`.
    fn resize(&self, image: &mut Self::Handle, scale: f64, kernel: Kernel)
    -> Result<(), BackendError>;

    /// Resize with independent horizontal and vertical factors.
    fn resize_axis_scale(
        &self,
        image: &mut Self::Handle,
        hscale: f64,
        vscale: f64,
        kernel: Kernel,
    ) -> Result<(), BackendError>;

    /// Resize towards a `width × height` box following `size`, cropping per `interest`.
    fn thumbnail_to_size(
        &self,
        image: &mut Self::Handle,
        width: u32,
        height: u32,
        interest: Interesting,
        size: SizeMode,
    ) -> Result<(), BackendError>;

    /// Place the image at `(x, y)` on a `width × height` canvas.
    fn embed(
        &self,
        image: &mut Self::Handle,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        background: Background,
    ) -> Result<(), BackendError>;

    fn add_alpha(&self, image: &mut Self::Handle) -> Result<(), BackendError>;

    /// Composite a text watermark. The image must already carry alpha.
    fn watermark(
        &self,
        image: &mut Self::Handle,
        params: &WatermarkParams,
    ) -> Result<(), BackendError>;

    fn gaussian_blur(
        &self,
        image: &mut Self::Handle,
        sigma: f64,
        min_amplitude: f64,
    ) -> Result<(), BackendError>;

    fn encode(
        &self,
        image: &Self::Handle,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Encoded, BackendError>;

    /// Release the pixel data held by the handle.
    fn close(&self, image: &mut Self::Handle);

    fn dimensions(&self, image: &Self::Handle) -> Dimensions {
        Dimensions {
            width: self.width(image),
            height: self.height(image),
        }
    }
}
