//! Request pipeline: descriptor in, encoded image (or info JSON) out.
//!
//! ```text
//! descriptor ──parse──▶ Descriptor ──plan──▶ Request
//!                                              │
//!            Info ◀────────────────────────────┤
//!                                              ▼
//!   load ─▶ step 1 ─▶ step 2 ─▶ … ─▶ encode(format or source format)
//! ```
//!
//! Every option is parsed and validated during planning, before the source
//! bytes are decoded, so a malformed descriptor never costs a decode. The
//! decoded handle is owned by [`Processor::process`] and released on every
//! exit path. A [`CancelFlag`] is checked between steps; a backend call that
//! is already running is not interrupted.

use crate::descriptor::{self, Descriptor};
use crate::error::ProcessError;
use crate::imaging::operations::{apply_blur, apply_resize, apply_watermark, encode_image};
use crate::imaging::{
    Dimensions, Encoded, ImageBackend, OutputFormat, Quality, WatermarkParams,
};
use crate::options::{BlurOptions, ResizeOptions, WatermarkOptions, parse_format};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// One executable operation with its options already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Resize(ResizeOptions),
    Watermark(WatermarkParams),
    Blur(BlurOptions),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Resize(_) => "resize",
            Step::Watermark(_) => "watermark",
            Step::Blur(_) => "blur",
        }
    }
}

/// What a descriptor asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Report metadata of the untouched source.
    Info,
    Transform {
        steps: Vec<Step>,
        format: Option<OutputFormat>,
    },
}

/// Process-wide values the pipeline needs from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorSettings {
    pub quality: Quality,
    pub watermark_dpi: u32,
    pub watermark_margin: u32,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            watermark_dpi: 72,
            watermark_margin: 20,
        }
    }
}

impl From<&crate::config::ServiceConfig> for ProcessorSettings {
    fn from(config: &crate::config::ServiceConfig) -> Self {
        Self {
            quality: Quality::new(config.image.quality),
            watermark_dpi: config.watermark.dpi,
            watermark_margin: config.watermark.margin,
        }
    }
}

/// Turn a parsed descriptor into validated steps.
///
/// With `info` present nothing else is looked at. Unknown operation names
/// fail with `UnknownOperation`.
pub fn plan(parsed: &Descriptor, settings: &ProcessorSettings) -> Result<Request, ProcessError> {
    if parsed.info {
        return Ok(Request::Info);
    }
    let steps = parsed
        .operations
        .iter()
        .map(|op| match op.name.as_str() {
            "resize" => Ok(Step::Resize(ResizeOptions::parse(op)?)),
            "watermark" => Ok(Step::Watermark(
                WatermarkOptions::parse(op)?
                    .to_params(settings.watermark_dpi, settings.watermark_margin),
            )),
            "blur" => Ok(Step::Blur(BlurOptions::parse(op)?)),
            other => Err(ProcessError::UnknownOperation(other.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let format = parsed.format.as_ref().map(parse_format).transpose()?;
    Ok(Request::Transform { steps, format })
}

/// Shared cancellation signal for one request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the flag is raised.
    pub fn check(&self) -> Result<(), ProcessError> {
        if self.is_cancelled() {
            Err(ProcessError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// `{"value": …}` wrapper used by every info field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoValue<T> {
    pub value: T,
}

/// Metadata of the source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInfo {
    pub file_size: InfoValue<usize>,
    pub format: InfoValue<String>,
    pub image_height: InfoValue<u32>,
    pub image_width: InfoValue<u32>,
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutput {
    Image(Encoded),
    Info(ImageInfo),
}

/// Decoded handle that is closed when it goes out of scope.
struct OwnedHandle<'a, B: ImageBackend> {
    backend: &'a B,
    handle: B::Handle,
}

impl<B: ImageBackend> Drop for OwnedHandle<'_, B> {
    fn drop(&mut self) {
        self.backend.close(&mut self.handle);
    }
}

/// Runs descriptors against one backend.
pub struct Processor<B: ImageBackend> {
    backend: B,
    settings: ProcessorSettings,
}

impl<B: ImageBackend> Processor<B> {
    pub fn new(backend: B, settings: ProcessorSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    fn load(&self, source: &[u8]) -> Result<OwnedHandle<'_, B>, ProcessError> {
        let handle = self.backend.load_from_buffer(source)?;
        Ok(OwnedHandle {
            backend: &self.backend,
            handle,
        })
    }

    /// Run `descriptor` (optionally `image/`-prefixed) on `source`.
    pub fn process(
        &self,
        source: &[u8],
        descriptor: &str,
        cancel: &CancelFlag,
    ) -> Result<ProcessOutput, ProcessError> {
        let parsed = descriptor::parse(descriptor::strip_namespace(descriptor))?;
        let request = plan(&parsed, &self.settings)?;
        cancel.check()?;

        let mut image = self.load(source)?;
        let Dimensions { width, height } = self.backend.dimensions(&image.handle);
        debug!(
            width,
            height,
            format = self.backend.format(&image.handle).name(),
            bytes = source.len(),
            "source decoded"
        );

        let (steps, format) = match request {
            Request::Info => {
                return Ok(ProcessOutput::Info(ImageInfo {
                    file_size: InfoValue {
                        value: source.len(),
                    },
                    format: InfoValue {
                        value: self.backend.format(&image.handle).name().to_string(),
                    },
                    image_height: InfoValue { value: height },
                    image_width: InfoValue { value: width },
                }));
            }
            Request::Transform { steps, format } => (steps, format),
        };

        for (index, step) in steps.iter().enumerate() {
            cancel.check()?;
            debug!(index, op = step.name(), "applying operation");
            match step {
                Step::Resize(opts) => apply_resize(&self.backend, &mut image.handle, opts)?,
                Step::Watermark(params) => {
                    apply_watermark(&self.backend, &mut image.handle, params)?
                }
                Step::Blur(opts) => apply_blur(&self.backend, &mut image.handle, opts)?,
            }
        }

        cancel.check()?;
        let encoded = encode_image(&self.backend, &image.handle, format, self.settings.quality)?;
        debug!(
            format = encoded.format.name(),
            width = encoded.width,
            height = encoded.height,
            bytes = encoded.bytes.len(),
            "encoded"
        );
        Ok(ProcessOutput::Image(encoded))
    }
}
