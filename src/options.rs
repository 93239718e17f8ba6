//! Per-operation option parsers.
//!
//! Each parser turns the raw `key_value` tokens of one [`Operation`] into a
//! typed options struct and enforces that operation's invariants. All of this
//! happens before the source image is decoded, so bad input never reaches the
//! backend. Unknown keys are ignored; malformed values are rejected.

use crate::descriptor::Operation;
use crate::error::ProcessError;
use crate::imaging::{OutputFormat, Rgb, WatermarkParams};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::str::FromStr;

fn parse_value<T: FromStr>(op: &str, key: &str, value: &str) -> Result<T, ProcessError> {
    value
        .parse()
        .map_err(|_| ProcessError::param(format!("{op}: invalid value for `{key}`: `{value}`")))
}

fn parse_color(value: &str) -> Result<Rgb, ProcessError> {
    Rgb::from_hex(value).ok_or_else(|| ProcessError::decode(format!("invalid color: `{value}`")))
}

// =============================================================================
// resize
// =============================================================================

/// Resize strategy selected by `m_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Letterbox into an exact canvas.
    Pad,
    /// Cover then centre-crop to an exact canvas.
    Fill,
    /// Stretch to the box, or scale along the one given axis.
    Fixed,
    /// Scale by the larger per-axis factor.
    Mfit,
    /// Proportional downscale by the smaller per-axis factor.
    #[default]
    Default,
}

impl ResizeMode {
    /// Unrecognized names select the default mode.
    pub fn from_name(name: &str) -> Self {
        match name {
            "pad" => ResizeMode::Pad,
            "fill" => ResizeMode::Fill,
            "fixed" => ResizeMode::Fixed,
            "mfit" => ResizeMode::Mfit,
            _ => ResizeMode::Default,
        }
    }
}

/// Options of one `resize` operation.
///
/// After [`ResizeOptions::parse`]:
/// - `p` is zero whenever `w` or `h` is set;
/// - `l` and `s` are zero whenever `w` or `h` is set;
/// - at least one of `w, h, l, s, p` is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOptions {
    pub w: u32,
    pub h: u32,
    /// Long edge.
    pub l: u32,
    /// Short edge.
    pub s: u32,
    /// Percent.
    pub p: u32,
    /// Suppress upscaling beyond the source size.
    pub limit: bool,
    pub mode: ResizeMode,
    pub color: Option<Rgb>,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            w: 0,
            h: 0,
            l: 0,
            s: 0,
            p: 0,
            limit: true,
            mode: ResizeMode::Default,
            color: None,
        }
    }
}

impl ResizeOptions {
    pub fn parse(op: &Operation) -> Result<Self, ProcessError> {
        let mut opts = Self::default();
        for (key, value) in op.params() {
            match key {
                "w" => opts.w = parse_value("resize", key, value)?,
                "h" => opts.h = parse_value("resize", key, value)?,
                "l" => opts.l = parse_value("resize", key, value)?,
                "s" => opts.s = parse_value("resize", key, value)?,
                "p" => opts.p = parse_value("resize", key, value)?,
                "limit" => opts.limit = parse_value::<u32>("resize", key, value)? != 0,
                "m" => opts.mode = ResizeMode::from_name(value),
                "color" => opts.color = Some(parse_color(value)?),
                _ => {}
            }
        }

        let has_box = opts.w > 0 || opts.h > 0;
        if opts.p > 0 && has_box {
            opts.p = 0;
        }
        if (opts.l > 0 || opts.s > 0) && has_box {
            opts.l = 0;
            opts.s = 0;
        }
        if !opts.has_target() {
            return Err(ProcessError::param(
                "resize: one of w, h, l, s, p must be positive",
            ));
        }
        Ok(opts)
    }

    /// Any of `w, h, l, s` set.
    pub fn has_edges(&self) -> bool {
        self.w > 0 || self.h > 0 || self.l > 0 || self.s > 0
    }

    pub fn has_target(&self) -> bool {
        self.has_edges() || self.p > 0
    }
}

// =============================================================================
// watermark
// =============================================================================

/// Options of one `watermark` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkOptions {
    pub text: String,
    /// Opacity percent, 0–100.
    pub t: u32,
    pub rotate: i32,
    /// 1 turns tiling off.
    pub fill: u32,
    pub size: u32,
    pub color: Rgb,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            t: 100,
            rotate: 0,
            fill: 0,
            size: 40,
            color: Rgb::BLACK,
        }
    }
}

/// Largest accepted `size_`, in points.
pub const MAX_WATERMARK_SIZE: u32 = 1000;

/// Base64 that tolerates missing or present padding.
const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

fn decode_text(value: &str) -> Result<String, ProcessError> {
    let bytes = STANDARD_LENIENT
        .decode(value)
        .or_else(|_| URL_SAFE_LENIENT.decode(value))
        .map_err(|e| ProcessError::decode(format!("watermark: invalid base64 text: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| ProcessError::decode("watermark: text is not valid UTF-8"))
}

impl WatermarkOptions {
    pub fn parse(op: &Operation) -> Result<Self, ProcessError> {
        let mut opts = Self::default();
        for (key, value) in op.params() {
            match key {
                "text" => opts.text = decode_text(value)?,
                "fill" => opts.fill = parse_value("watermark", key, value)?,
                "size" => opts.size = parse_value("watermark", key, value)?,
                "rotate" => opts.rotate = parse_value("watermark", key, value)?,
                "t" => opts.t = parse_value("watermark", key, value)?,
                "color" => opts.color = parse_color(value)?,
                _ => {}
            }
        }

        if opts.text.is_empty() {
            return Err(ProcessError::param("Missing required param: text"));
        }
        if opts.t > 100 {
            return Err(ProcessError::param(format!(
                "watermark: `t` must be 0-100, got {}",
                opts.t
            )));
        }
        if opts.fill > 1 {
            return Err(ProcessError::param(format!(
                "watermark: `fill` must be 0 or 1, got {}",
                opts.fill
            )));
        }
        if opts.size == 0 || opts.size > MAX_WATERMARK_SIZE {
            return Err(ProcessError::param(format!(
                "watermark: `size` must be 1-{MAX_WATERMARK_SIZE}, got {}",
                opts.size
            )));
        }
        Ok(opts)
    }

    /// Resolve into backend parameters.
    ///
    /// Opacity becomes a fraction, rotation is reduced to one turn and
    /// shifted by −360°, and `fill_1` disables tiling.
    pub fn to_params(&self, dpi: u32, margin: u32) -> WatermarkParams {
        WatermarkParams {
            text: self.text.clone(),
            font_size: self.size,
            dpi,
            opacity: self.t as f32 / 100.0,
            rotate: self.rotate.rem_euclid(360) - 360,
            replicate: self.fill != 1,
            margin,
            color: self.color,
        }
    }
}

// =============================================================================
// blur
// =============================================================================

/// Options of one `blur` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurOptions {
    pub sigma: f64,
    pub radius: f64,
}

impl BlurOptions {
    pub fn parse(op: &Operation) -> Result<Self, ProcessError> {
        let mut sigma: f64 = 0.0;
        let mut radius: f64 = 0.0;
        for (key, value) in op.params() {
            match key {
                "s" => sigma = parse_value("blur", key, value)?,
                "r" => radius = parse_value("blur", key, value)?,
                _ => {}
            }
        }
        if sigma.is_nan() || radius.is_nan() || sigma <= 0.0 || radius <= 0.0 {
            return Err(ProcessError::param(
                "Missing required param: sigma or radius",
            ));
        }
        Ok(Self { sigma, radius })
    }

    /// `1 − (radius / 50)² / 2`.
    pub fn min_amplitude(&self) -> f64 {
        1.0 - (self.radius / 50.0).powi(2) / 2.0
    }
}

// =============================================================================
// format
// =============================================================================

/// Target encoder named by a `format` operation's first token.
pub fn parse_format(op: &Operation) -> Result<OutputFormat, ProcessError> {
    match op.options.first() {
        Some(name) if !name.is_empty() => Ok(OutputFormat::from_name(name)),
        _ => Err(ProcessError::param("Missing required param: format")),
    }
}
