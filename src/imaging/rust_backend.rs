//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, TIFF, GIF, BMP) | `image::ImageReader` with `Limits` |
//! | Resize | `DynamicImage::resize_exact` with the mapped `FilterType` |
//! | Fill / force thumbnail | `DynamicImage::resize_to_fill` / `resize_exact` |
//! | Embed | `image::imageops::replace` onto a fresh canvas |
//! | Watermark | [`watermark`](super::watermark): `font8x8` glyphs + `imageproc` rotation |
//! | Gaussian blur | `imageproc::filter::separable_filter_equal` |
//! | Encode | `image::codecs::{jpeg, png, webp, tiff, gif, bmp}` |

use super::backend::{BackendError, Encoded, ImageBackend};
use super::format::{ImageType, OutputFormat};
use super::params::{
    Background, ExtendStrategy, Interesting, Kernel, Quality, Rgb, SizeMode, WatermarkParams,
};
use super::watermark;
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Frame, ImageFormat, ImageReader, Limits, RgbImage, RgbaImage};
use imageproc::filter::separable_filter_equal;
use std::io::Cursor;

/// Largest image, in pixels, any operation may produce unless configured otherwise.
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 100_000_000;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustBackend {
    max_decode_bytes: Option<u64>,
    max_output_pixels: u64,
}

impl Default for RustBackend {
    fn default() -> Self {
        Self {
            max_decode_bytes: None,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the memory a single decode may allocate.
    pub fn with_decode_limit(max_decode_bytes: Option<u64>) -> Self {
        Self {
            max_decode_bytes,
            ..Self::default()
        }
    }

    /// Cap the pixel count of every canvas an operation allocates.
    pub fn with_output_limit(mut self, max_output_pixels: u64) -> Self {
        self.max_output_pixels = max_output_pixels;
        self
    }

    /// Reject a `width × height` result before anything is allocated.
    fn check_output(&self, what: &str, width: u64, height: u64) -> Result<(), BackendError> {
        let pixels = width.saturating_mul(height);
        if pixels > self.max_output_pixels || width > u32::MAX as u64 || height > u32::MAX as u64
        {
            return Err(BackendError::TooLarge(format!(
                "{what} of {width}x{height} exceeds the {}-pixel limit",
                self.max_output_pixels
            )));
        }
        Ok(())
    }
}

/// Decoded image owned by one request.
#[derive(Debug, Clone)]
pub struct RustImage {
    pixels: DynamicImage,
    format: ImageType,
}

impl RustImage {
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

fn image_type(format: ImageFormat) -> ImageType {
    match format {
        ImageFormat::Jpeg => ImageType::Jpeg,
        ImageFormat::Png => ImageType::Png,
        ImageFormat::WebP => ImageType::Webp,
        ImageFormat::Tiff => ImageType::Tiff,
        ImageFormat::Gif => ImageType::Gif,
        ImageFormat::Bmp => ImageType::Bmp,
        _ => ImageType::Unknown,
    }
}

fn filter_type(kernel: Kernel) -> FilterType {
    match kernel {
        Kernel::Nearest => FilterType::Nearest,
        Kernel::Linear => FilterType::Triangle,
        Kernel::Cubic => FilterType::CatmullRom,
        Kernel::Lanczos3 => FilterType::Lanczos3,
    }
}

fn scaled(dim: u32, scale: f64) -> u32 {
    let value = (dim as f64 * scale).round();
    if value.is_finite() {
        value.clamp(1.0, u32::MAX as f64) as u32
    } else {
        1
    }
}

/// Size after scaling `src` by `pick` of the two per-axis ratios to a `box_w × box_h`
/// box, rounded up so the bound never undershoots what the resampler allocates.
fn scaled_extent(
    src_w: u32,
    src_h: u32,
    box_w: u32,
    box_h: u32,
    pick: fn(f64, f64) -> f64,
) -> (u64, u64) {
    let ratio = pick(box_w as f64 / src_w.max(1) as f64, box_h as f64 / src_h.max(1) as f64);
    let side = |dim: u32| (dim as f64 * ratio).ceil().clamp(1.0, u64::MAX as f64) as u64;
    (side(src_w), side(src_h))
}

/// Half-width of a sampled Gaussian: the furthest tap whose weight is still
/// at least `min_amplitude`, or 3σ when every tap qualifies.
pub fn gaussian_half_width(sigma: f64, min_amplitude: f64) -> usize {
    let half = if min_amplitude <= 0.0 {
        (3.0 * sigma).ceil()
    } else if min_amplitude >= 1.0 {
        0.0
    } else {
        (sigma * (-2.0 * min_amplitude.ln()).sqrt()).floor()
    };
    (half as usize).max(1)
}

/// Normalized 1-D Gaussian kernel of `2 × half + 1` taps.
pub fn gaussian_kernel(sigma: f64, half: usize) -> Vec<f32> {
    let half = half as i64;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-half..=half)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

fn blurred(pixels: &DynamicImage, kernel: &[f32]) -> DynamicImage {
    match pixels {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(separable_filter_equal(buf, kernel)),
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(separable_filter_equal(buf, kernel))
        }
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(separable_filter_equal(buf, kernel)),
        DynamicImage::ImageRgba8(buf) => {
            DynamicImage::ImageRgba8(separable_filter_equal(buf, kernel))
        }
        other if other.color().has_alpha() => {
            DynamicImage::ImageRgba8(separable_filter_equal(&other.to_rgba8(), kernel))
        }
        other => DynamicImage::ImageRgb8(separable_filter_equal(&other.to_rgb8(), kernel)),
    }
}

fn solid_canvas(width: u32, height: u32, color: Rgb, alpha: bool) -> DynamicImage {
    if alpha {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([color.r, color.g, color.b, 255]),
        ))
    } else {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([color.r, color.g, color.b]),
        ))
    }
}

fn encode_failed(format: &str) -> impl FnOnce(image::ImageError) -> BackendError + '_ {
    move |e| BackendError::ProcessingFailed(format!("{format} encode failed: {e}"))
}

/// Encoder actually used for a request, after resolving `Native`.
fn concrete_target(format: OutputFormat, source: ImageType) -> ImageType {
    match format {
        OutputFormat::Jpeg => ImageType::Jpeg,
        OutputFormat::Png => ImageType::Png,
        OutputFormat::Webp => ImageType::Webp,
        OutputFormat::Tiff => ImageType::Tiff,
        OutputFormat::Gif => ImageType::Gif,
        OutputFormat::Native => match source {
            ImageType::Unknown => ImageType::Png,
            known => known,
        },
    }
}

/// 8-bit copy in a colour type every encoder accepts.
fn eight_bit(pixels: &DynamicImage, keep_alpha: bool) -> DynamicImage {
    if keep_alpha && pixels.color().has_alpha() {
        DynamicImage::ImageRgba8(pixels.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(pixels.to_rgb8())
    }
}

fn encode_pixels(
    pixels: &DynamicImage,
    target: ImageType,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    match target {
        ImageType::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.value() as u8);
            eight_bit(pixels, false)
                .write_with_encoder(encoder)
                .map_err(encode_failed("JPEG"))?;
        }
        ImageType::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut bytes,
                CompressionType::Default,
                image::codecs::png::FilterType::Adaptive,
            );
            eight_bit(pixels, true)
                .write_with_encoder(encoder)
                .map_err(encode_failed("PNG"))?;
        }
        ImageType::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut bytes);
            eight_bit(pixels, true)
                .write_with_encoder(encoder)
                .map_err(encode_failed("WebP"))?;
        }
        ImageType::Tiff => {
            let encoder = TiffEncoder::new(Cursor::new(&mut bytes));
            eight_bit(pixels, true)
                .write_with_encoder(encoder)
                .map_err(encode_failed("TIFF"))?;
        }
        ImageType::Gif => {
            // the encoder writes the trailer when dropped
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder
                .encode_frame(Frame::new(pixels.to_rgba8()))
                .map_err(encode_failed("GIF"))?;
        }
        ImageType::Bmp => {
            let encoder = BmpEncoder::new(&mut bytes);
            eight_bit(pixels, true)
                .write_with_encoder(encoder)
                .map_err(encode_failed("BMP"))?;
        }
        ImageType::Unknown => {
            return Err(BackendError::ProcessingFailed(
                "no encoder for unknown format".into(),
            ));
        }
    }
    Ok(bytes)
}

impl ImageBackend for RustBackend {
    type Handle = RustImage;

    fn load_from_buffer(&self, bytes: &[u8]) -> Result<RustImage, BackendError> {
        let format = image::guess_format(bytes)
            .map_err(|e| BackendError::Decode(format!("unrecognized image data: {e}")))?;
        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        let mut limits = Limits::default();
        if let Some(max) = self.max_decode_bytes {
            limits.max_alloc = Some(max);
        }
        reader.limits(limits);
        let pixels = reader
            .decode()
            .map_err(|e| BackendError::Decode(format!("failed to decode image: {e}")))?;
        Ok(RustImage {
            pixels,
            format: image_type(format),
        })
    }

    fn width(&self, image: &RustImage) -> u32 {
        image.pixels.width()
    }

    fn height(&self, image: &RustImage) -> u32 {
        image.pixels.height()
    }

    fn format(&self, image: &RustImage) -> ImageType {
        image.format
    }

    fn has_alpha(&self, image: &RustImage) -> bool {
        image.pixels.color().has_alpha()
    }

    fn resize(&self, image: &mut RustImage, scale: f64, kernel: Kernel) -> Result<(), BackendError> {
        self.resize_axis_scale(image, scale, scale, kernel)
    }

    fn resize_axis_scale(
        &self,
        image: &mut RustImage,
        hscale: f64,
        vscale: f64,
        kernel: Kernel,
    ) -> Result<(), BackendError> {
        if hscale.is_nan() || vscale.is_nan() || hscale <= 0.0 || vscale <= 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "invalid resize scale {hscale}x{vscale}"
            )));
        }
        let width = scaled(image.pixels.width(), hscale);
        let height = scaled(image.pixels.height(), vscale);
        self.check_output("resize", width as u64, height as u64)?;
        image.pixels = image
            .pixels
            .resize_exact(width, height, filter_type(kernel));
        Ok(())
    }

    fn thumbnail_to_size(
        &self,
        image: &mut RustImage,
        width: u32,
        height: u32,
        interest: Interesting,
        size: SizeMode,
    ) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "invalid thumbnail size {width}x{height}"
            )));
        }
        let (src_w, src_h) = (image.pixels.width(), image.pixels.height());
        let (out_w, out_h) = match (size, interest) {
            (SizeMode::Force, _) => (width as u64, height as u64),
            // scaled to cover the box before the crop
            (SizeMode::Both, Interesting::Centre) => {
                scaled_extent(src_w, src_h, width, height, f64::max)
            }
            (SizeMode::Both, Interesting::All) => {
                scaled_extent(src_w, src_h, width, height, f64::min)
            }
        };
        self.check_output("thumbnail", out_w, out_h)?;
        image.pixels = match (size, interest) {
            (SizeMode::Force, _) => image.pixels.resize_exact(width, height, FilterType::Lanczos3),
            (SizeMode::Both, Interesting::Centre) => {
                image
                    .pixels
                    .resize_to_fill(width, height, FilterType::Lanczos3)
            }
            (SizeMode::Both, Interesting::All) => {
                image.pixels.resize(width, height, FilterType::Lanczos3)
            }
        };
        Ok(())
    }

    fn embed(
        &self,
        image: &mut RustImage,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        background: Background,
    ) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "invalid embed canvas {width}x{height}"
            )));
        }
        self.check_output("embed canvas", width as u64, height as u64)?;
        let alpha = image.pixels.color().has_alpha();
        let mut canvas = match background {
            Background::Color(color) => solid_canvas(width, height, color, alpha),
            Background::Extend(ExtendStrategy::White) => {
                solid_canvas(width, height, Rgb::WHITE, alpha)
            }
            Background::Extend(ExtendStrategy::Background) if alpha => {
                DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            }
            Background::Extend(ExtendStrategy::Background) => {
                solid_canvas(width, height, Rgb::BLACK, false)
            }
        };
        let top = eight_bit(&image.pixels, alpha);
        imageops::replace(&mut canvas, &top, x, y);
        image.pixels = canvas;
        Ok(())
    }

    fn add_alpha(&self, image: &mut RustImage) -> Result<(), BackendError> {
        if !image.pixels.color().has_alpha() {
            image.pixels = DynamicImage::ImageRgba8(image.pixels.to_rgba8());
        }
        Ok(())
    }

    fn watermark(
        &self,
        image: &mut RustImage,
        params: &WatermarkParams,
    ) -> Result<(), BackendError> {
        if !image.pixels.color().has_alpha() {
            return Err(BackendError::ProcessingFailed(
                "watermark needs an alpha channel".into(),
            ));
        }
        let (tile_w, tile_h) = watermark::tile_extent(params);
        self.check_output("watermark tile", tile_w, tile_h)?;
        let tile = watermark::render_tile(params).ok_or_else(|| {
            BackendError::TooLarge(format!("watermark tile of {tile_w}x{tile_h}"))
        })?;
        let mut canvas = image.pixels.to_rgba8();
        watermark::composite(&mut canvas, &tile, params.replicate);
        image.pixels = DynamicImage::ImageRgba8(canvas);
        Ok(())
    }

    fn gaussian_blur(
        &self,
        image: &mut RustImage,
        sigma: f64,
        min_amplitude: f64,
    ) -> Result<(), BackendError> {
        if sigma.is_nan() || sigma <= 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "invalid blur sigma {sigma}"
            )));
        }
        // capped at the longest side of the image
        let longest = image.pixels.width().max(image.pixels.height()).max(1) as usize;
        let half = gaussian_half_width(sigma, min_amplitude).min(longest);
        let kernel = gaussian_kernel(sigma, half);
        image.pixels = blurred(&image.pixels, &kernel);
        Ok(())
    }

    fn encode(
        &self,
        image: &RustImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Encoded, BackendError> {
        let target = concrete_target(format, image.format);
        let bytes = encode_pixels(&image.pixels, target, quality)?;
        Ok(Encoded {
            bytes,
            format: target,
            width: image.pixels.width(),
            height: image.pixels.height(),
        })
    }

    fn close(&self, image: &mut RustImage) {
        image.pixels = DynamicImage::new_rgba8(0, 0);
    }
}
