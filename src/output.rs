//! CLI output formatting.
//!
//! The offline `process` command and the `serve` startup banner print short
//! indented reports. The primary line names the thing (a source file, a
//! listening address), and indented lines carry the details:
//!
//! ```text
//! photo.jpg (1.2 MB)
//!     Descriptor: resize,w_100/format,png
//!     Result: png 100x75 (12.3 KB)
//!     Output: thumb.png
//! ```
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::config::{ServiceConfig, effective_threads};
use crate::imaging::Encoded;
use crate::pipeline::ImageInfo;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above 1 KB.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// process
// ============================================================================

/// Report for one transformed image.
pub fn format_process_summary(
    input: &Path,
    source_bytes: usize,
    descriptor: &str,
    encoded: &Encoded,
    output: &Path,
) -> Vec<String> {
    vec![
        format!("{} ({})", display_name(input), format_bytes(source_bytes)),
        format!("{}Descriptor: {}", indent(1), descriptor),
        format!(
            "{}Result: {} {}x{} ({})",
            indent(1),
            encoded.format.name(),
            encoded.width,
            encoded.height,
            format_bytes(encoded.bytes.len())
        ),
        format!("{}Output: {}", indent(1), output.display()),
    ]
}

pub fn print_process_summary(
    input: &Path,
    source_bytes: usize,
    descriptor: &str,
    encoded: &Encoded,
    output: &Path,
) {
    for line in format_process_summary(input, source_bytes, descriptor, encoded, output) {
        println!("{}", line);
    }
}

/// Report for an `info` request.
pub fn format_info(input: &Path, info: &ImageInfo) -> Vec<String> {
    vec![
        format!(
            "{} ({})",
            display_name(input),
            format_bytes(info.file_size.value)
        ),
        format!("{}Format: {}", indent(1), info.format.value),
        format!(
            "{}Size: {}x{}",
            indent(1),
            info.image_width.value,
            info.image_height.value
        ),
    ]
}

pub fn print_info(input: &Path, info: &ImageInfo) {
    for line in format_info(input, info) {
        println!("{}", line);
    }
}

// ============================================================================
// serve
// ============================================================================

/// Startup banner listing the effective service settings.
pub fn format_server_banner(config: &ServiceConfig) -> Vec<String> {
    let timeout = match config.server.timeout_secs {
        0 => "none".to_string(),
        secs => format!("{secs}s"),
    };
    let decode_limit = config
        .backend
        .max_decode_bytes
        .map(|b| format_bytes(b as usize))
        .unwrap_or_else(|| "none".to_string());
    let errors = if config.server.legacy_error_status {
        "always 200"
    } else {
        "status = code"
    };

    vec![
        format!("Listening on {}", config.server.addr),
        format!("{}Workers: {}", indent(1), effective_threads(&config.backend)),
        format!("{}Timeout: {}", indent(1), timeout),
        format!(
            "{}Max body: {}",
            indent(1),
            format_bytes(config.server.max_body_bytes)
        ),
        format!("{}Decode limit: {}", indent(1), decode_limit),
        format!("{}Default quality: {}", indent(1), config.image.quality),
        format!("{}Errors: {}", indent(1), errors),
    ]
}

pub fn print_server_banner(config: &ServiceConfig) {
    for line in format_server_banner(config) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageType;
    use crate::pipeline::InfoValue;

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn indent_is_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Reports
    // =========================================================================

    #[test]
    fn process_summary_lists_result_and_output() {
        let encoded = Encoded {
            bytes: vec![0; 1536],
            format: ImageType::Png,
            width: 100,
            height: 75,
        };
        let lines = format_process_summary(
            Path::new("/tmp/in/photo.jpg"),
            4096,
            "resize,w_100/format,png",
            &encoded,
            Path::new("thumb.png"),
        );
        assert_eq!(
            lines,
            vec![
                "photo.jpg (4.0 KB)",
                "    Descriptor: resize,w_100/format,png",
                "    Result: png 100x75 (1.5 KB)",
                "    Output: thumb.png",
            ]
        );
    }

    #[test]
    fn info_report_shows_format_and_size() {
        let info = ImageInfo {
            file_size: InfoValue { value: 100 },
            format: InfoValue {
                value: "jpeg".into(),
            },
            image_height: InfoValue { value: 480 },
            image_width: InfoValue { value: 640 },
        };
        let lines = format_info(Path::new("a.jpg"), &info);
        assert_eq!(lines, vec!["a.jpg (100 B)", "    Format: jpeg", "    Size: 640x480"]);
    }

    #[test]
    fn banner_reflects_config() {
        let mut config = ServiceConfig::default();
        config.server.timeout_secs = 0;
        config.server.legacy_error_status = true;
        let lines = format_server_banner(&config);
        assert_eq!(lines[0], "Listening on 0.0.0.0:8000");
        assert!(lines.contains(&"    Timeout: none".to_string()));
        assert!(lines.contains(&"    Max body: 50.0 MB".to_string()));
        assert!(lines.contains(&"    Decode limit: none".to_string()));
        assert!(lines.contains(&"    Errors: always 200".to_string()));
    }
}
