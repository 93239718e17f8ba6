//! High-level image operations.
//!
//! These functions combine the resize planner with backend execution. They
//! take already-parsed options, compute parameters, and call the backend on
//! one handle in place.

use super::backend::{Dimensions, Encoded, ImageBackend};
use super::calculations::{GeometryStep, SourceGeometry, centered_offset, plan_resize};
use super::format::{OutputFormat, resolve_output_format};
use super::params::{Quality, WatermarkParams};
use crate::error::ProcessError;
use crate::options::{BlurOptions, ResizeOptions};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Snapshot of the handle's geometry for the planner.
pub fn source_geometry<B: ImageBackend>(backend: &B, image: &B::Handle) -> SourceGeometry {
    let Dimensions { width, height } = backend.dimensions(image);
    SourceGeometry {
        width,
        height,
        has_alpha: backend.has_alpha(image),
    }
}

fn execute_step<B: ImageBackend>(
    backend: &B,
    image: &mut B::Handle,
    step: GeometryStep,
) -> Result<()> {
    match step {
        GeometryStep::Resize { scale, kernel } => backend.resize(image, scale, kernel)?,
        GeometryStep::ResizeAxes {
            hscale,
            vscale,
            kernel,
        } => backend.resize_axis_scale(image, hscale, vscale, kernel)?,
        GeometryStep::Thumbnail {
            width,
            height,
            interest,
            size,
        } => backend.thumbnail_to_size(image, width, height, interest, size)?,
        GeometryStep::EmbedCentered {
            width,
            height,
            background,
        } => {
            let x = centered_offset(width, backend.width(image));
            let y = centered_offset(height, backend.height(image));
            backend.embed(image, x, y, width, height, background)?
        }
    }
    Ok(())
}

/// Apply one resize operation. A resize suppressed by `limit` is a no-op.
pub fn apply_resize<B: ImageBackend>(
    backend: &B,
    image: &mut B::Handle,
    opts: &ResizeOptions,
) -> Result<()> {
    let plan = plan_resize(opts, source_geometry(backend, image))?;
    if plan.is_empty() {
        tracing::debug!(mode = ?opts.mode, "resize skipped by limit");
    }
    for step in plan {
        execute_step(backend, image, step)?;
    }
    Ok(())
}

/// Composite a text watermark, adding an alpha channel first when missing.
pub fn apply_watermark<B: ImageBackend>(
    backend: &B,
    image: &mut B::Handle,
    params: &WatermarkParams,
) -> Result<()> {
    if !backend.has_alpha(image) {
        backend.add_alpha(image)?;
    }
    backend.watermark(image, params)?;
    Ok(())
}

pub fn apply_blur<B: ImageBackend>(
    backend: &B,
    image: &mut B::Handle,
    opts: &BlurOptions,
) -> Result<()> {
    backend.gaussian_blur(image, opts.sigma, opts.min_amplitude())?;
    Ok(())
}

/// Encode with the requested format, or the source's own when none was given.
pub fn encode_image<B: ImageBackend>(
    backend: &B,
    image: &B::Handle,
    requested: Option<OutputFormat>,
    quality: Quality,
) -> Result<Encoded> {
    let format = resolve_output_format(requested, backend.format(image));
    Ok(backend.encode(image, format, quality)?)
}
