//! Container formats and output format resolution.
//!
//! [`ImageType`] is what a decoded image *is*; [`OutputFormat`] is what the
//! caller asked to encode to. An explicit `format` operation wins, otherwise the
//! source format is kept. Names without a dedicated encoder fall back to
//! [`OutputFormat::Native`], which re-encodes in the source's own format.

/// Detected container format of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Bmp,
    Unknown,
}

impl ImageType {
    /// Lowercase name, as reported by the `info` operation.
    pub fn name(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Webp => "webp",
            ImageType::Tiff => "tiff",
            ImageType::Gif => "gif",
            ImageType::Bmp => "bmp",
            ImageType::Unknown => "unknown",
        }
    }

    /// Content type for a response carrying this format. Defaults to JPEG.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Webp => "image/webp",
            ImageType::Tiff => "image/tiff",
            ImageType::Gif => "image/gif",
            ImageType::Bmp => "image/bmp",
            ImageType::Jpeg | ImageType::Unknown => "image/jpeg",
        }
    }
}

/// Encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    /// Whatever format the source was decoded from.
    Native,
}

impl OutputFormat {
    /// Map a format name to an encoder. Case-insensitive; `jpg` is an alias of `jpeg`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "png" => OutputFormat::Png,
            "webp" => OutputFormat::Webp,
            "tiff" | "tif" => OutputFormat::Tiff,
            "gif" => OutputFormat::Gif,
            _ => OutputFormat::Native,
        }
    }
}

/// Pick the encoder for a request.
///
/// With no explicit format the source's own format name is used, which lands
/// on the matching dedicated encoder or on `Native` for anything else.
pub fn resolve_output_format(requested: Option<OutputFormat>, source: ImageType) -> OutputFormat {
    requested.unwrap_or_else(|| OutputFormat::from_name(source.name()))
}
