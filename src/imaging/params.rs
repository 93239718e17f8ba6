//! Parameter types for backend calls.
//!
//! These describe *what* the backend should do, not *how*. The resize policy
//! engine and the operation dispatcher produce them; the
//! [`backend`](super::backend) consumes them.
//!
//! ## Types
//!
//! - [`Quality`]: Encoder quality (1–100, default 100). Clamped on construction.
//! - [`Kernel`]: Resampling filter for scale-based resizes.
//! - [`Interesting`] / [`SizeMode`]: Crop anchor and sizing rule for thumbnail-style resizes.
//! - [`Rgb`]: Solid colour parsed from a 6-digit hex string.
//! - [`Background`]: What fills the canvas around an embedded image.
//! - [`WatermarkParams`]: Fully resolved text watermark.

/// Quality setting for image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Nearest,
    Linear,
    Cubic,
    Lanczos3,
}

/// Which part of the image to keep when a resize has to crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interesting {
    /// Keep the centre.
    Centre,
    /// Keep everything (no crop).
    All,
}

/// How a thumbnail-style resize treats the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    /// Cover the box on both axes, preserving aspect ratio.
    Both,
    /// Stretch to exactly the box, ignoring aspect ratio.
    Force,
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Parse exactly six hex digits (`"ff8800"`). No `#` prefix.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
        })
    }
}

/// How pixels outside the embedded image are filled when no colour is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendStrategy {
    /// Opaque white.
    White,
    /// The backend's background value: transparent for images with alpha.
    Background,
}

/// Canvas fill for an embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Color(Rgb),
    Extend(ExtendStrategy),
}

/// Resolved text watermark, ready for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub text: String,
    /// Font size in points.
    pub font_size: u32,
    /// Resolution used to turn points into pixels.
    pub dpi: u32,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    /// Rotation in degrees as handed to the backend.
    pub rotate: i32,
    /// Tile the watermark across the whole image.
    pub replicate: bool,
    /// Spacing added to each watermark tile.
    pub margin: u32,
    pub color: Rgb,
}
