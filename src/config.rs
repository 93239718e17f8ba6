//! Service configuration module.
//!
//! Handles loading, validating, and merging the service `config.toml`. Stock
//! defaults are the base layer; a user file only needs the keys it overrides.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! addr = "0.0.0.0:8000"        # Listen address
//! timeout_secs = 30            # Per-request processing timeout (0 = none)
//! max_body_bytes = 52428800    # Largest accepted upload
//! legacy_error_status = false  # Answer errors with HTTP 200 + JSON body
//!
//! [image]
//! quality = 100                # Encoder quality (1-100)
//! max_output_pixels = 100000000 # Largest canvas any operation may produce
//!
//! [backend]
//! concurrency_level = 4        # Pixel worker threads (0 = all cores)
//! # max_decode_bytes = 536870912
//! buffer_pool_size = 64        # Idle request buffers kept for reuse
//!
//! [watermark]
//! dpi = 72                     # Points → pixels for `size_`
//! margin = 20                  # Spacing around each watermark tile
//!
//! [logging]
//! level = "info"               # tracing EnvFilter directive (RUST_LOG wins)
//! ansi = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::DEFAULT_MAX_OUTPUT_PIXELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener and request limits.
    pub server: ServerConfig,
    /// Encoding settings.
    pub image: ImageConfig,
    /// Worker pool and decoder tunables.
    pub backend: BackendConfig,
    /// Watermark rendering constants.
    pub watermark: WatermarkConfig,
    /// Log filter and formatting.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if !(1..=100).contains(&self.image.quality) {
            return Err(ConfigError::Validation(
                "image.quality must be 1-100".into(),
            ));
        }
        if !(1..=u32::MAX as u64).contains(&self.image.max_output_pixels) {
            return Err(ConfigError::Validation(format!(
                "image.max_output_pixels must be 1-{}",
                u32::MAX
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_body_bytes must be positive".into(),
            ));
        }
        if self.watermark.dpi == 0 {
            return Err(ConfigError::Validation(
                "watermark.dpi must be positive".into(),
            ));
        }
        if self.backend.max_decode_bytes == Some(0) {
            return Err(ConfigError::Validation(
                "backend.max_decode_bytes must be positive when set".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: String,
    /// Seconds a request may spend processing before it is cancelled.
    /// Zero disables the timeout.
    pub timeout_secs: u64,
    pub max_body_bytes: usize,
    /// Report every error with HTTP 200, leaving failure to the JSON body.
    pub legacy_error_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            timeout_secs: 30,
            max_body_bytes: 50 * 1024 * 1024,
            legacy_error_status: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr.parse().map_err(|e| {
            ConfigError::Validation(format!("server.addr `{}` is invalid: {e}", self.addr))
        })
    }
}

/// Encoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub quality: u32,
    /// Pixel ceiling for every canvas an operation allocates. Larger
    /// requests are rejected before any allocation.
    pub max_output_pixels: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: 100,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }
}

/// Process-wide backend tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Worker threads for pixel work. Zero means one per core.
    /// Values larger than the core count are clamped down.
    pub concurrency_level: usize,
    /// Allocation ceiling for a single decode. Absent means the decoder default.
    pub max_decode_bytes: Option<u64>,
    /// Idle request buffers kept for reuse.
    pub buffer_pool_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            concurrency_level: 4,
            max_decode_bytes: None,
            buffer_pool_size: 64,
        }
    }
}

/// Resolve the effective worker count from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &BackendConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.concurrency_level {
        0 => cores,
        n => n.min(cores),
    }
}

/// Watermark rendering constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub dpi: u32,
    pub margin: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self { dpi: 72, margin: 20 }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"oss_image_process=debug"`.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or the stock defaults when no path is given.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# oss-image-process configuration
# ================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
# Address the listener binds to.
addr = "0.0.0.0:8000"

# Seconds a single request may spend processing before it is cancelled.
# 0 disables the timeout.
timeout_secs = 30

# Largest accepted request body, in bytes (default 50 MiB).
max_body_bytes = 52428800

# When true, failed requests are answered with HTTP 200 and the JSON error
# body only. Keep false unless old clients depend on it.
legacy_error_status = false

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[image]
# Encoder quality for lossy formats (1-100).
quality = 100

# Largest image, in pixels, any operation may produce: resize results, the
# cover size of a fill before its crop, pad canvases, watermark tiles.
# Requests above it fail with a PARAM_ERROR before anything is allocated.
max_output_pixels = 100000000

# ---------------------------------------------------------------------------
# Backend
# ---------------------------------------------------------------------------
[backend]
# Worker threads for pixel work. 0 uses every core; larger values are
# clamped to the core count.
concurrency_level = 4

# Allocation ceiling for decoding one image, in bytes. Unset uses the
# decoder's own default.
# max_decode_bytes = 536870912

# Request buffers kept for reuse between requests.
buffer_pool_size = 64

# ---------------------------------------------------------------------------
# Watermark
# ---------------------------------------------------------------------------
[watermark]
# Resolution used to turn `size_` points into pixels.
dpi = 72

# Transparent spacing around each watermark tile, in pixels.
margin = 20

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing EnvFilter directive. RUST_LOG overrides it when set.
level = "info"

# Colored output.
ansi = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.server.max_body_bytes, 50 * 1024 * 1024);
        assert!(!config.server.legacy_error_status);
        assert_eq!(config.image.quality, 100);
        assert_eq!(config.backend.concurrency_level, 4);
        assert_eq!(config.backend.max_decode_bytes, None);
        assert_eq!(config.watermark, WatermarkConfig { dpi: 72, margin: 20 });
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[server]
timeout_secs = 5
"#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.timeout_secs, 5);
        // Default values preserved
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.image.quality, 100);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_without_path_is_stock() {
        let config = load_config(None).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[image]
quality = 80

[backend]
max_decode_bytes = 1048576
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.image.quality, 80);
        assert_eq!(config.backend.max_decode_bytes, Some(1_048_576));
        assert_eq!(config.backend.buffer_pool_size, 64);
    }

    #[test]
    fn load_config_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[server\naddr = ").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[image]\nquality = 0\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // effective_threads tests
    // =========================================================================

    fn cores() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    #[test]
    fn effective_threads_zero_means_all_cores() {
        let config = BackendConfig {
            concurrency_level: 0,
            ..BackendConfig::default()
        };
        assert_eq!(effective_threads(&config), cores());
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = BackendConfig {
            concurrency_level: 99999,
            ..BackendConfig::default()
        };
        assert_eq!(effective_threads(&config), cores());
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = BackendConfig {
            concurrency_level: 1,
            ..BackendConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[server]\ntimeout_secs = 1\n").unwrap();
        let merged = merge_toml(base, overlay);
        let server = merged.get("server").unwrap();
        assert_eq!(server.get("timeout_secs").unwrap().as_integer(), Some(1));
        assert_eq!(
            server.get("addr").unwrap().as_str(),
            Some("0.0.0.0:8000")
        );
    }

    // =========================================================================
    // Unknown key rejection / validation tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<ServiceConfig, _> = toml::from_str("[server]\nadress = \"x\"\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ServiceConfig, _> = toml::from_str("[cache]\nsize = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_addr() {
        let mut config = ServiceConfig::default();
        config.server.addr = "not-an-address".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = ServiceConfig::default();
        config.image.quality = 1;
        assert!(config.validate().is_ok());
        config.image.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_output_pixel_bounds() {
        let mut config = ServiceConfig::default();
        assert_eq!(config.image.max_output_pixels, 100_000_000);
        config.image.max_output_pixels = 0;
        assert!(config.validate().is_err());
        config.image.max_output_pixels = u32::MAX as u64;
        assert!(config.validate().is_ok());
        config.image.max_output_pixels = u32::MAX as u64 + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_dpi_and_body_limit() {
        let mut config = ServiceConfig::default();
        config.watermark.dpi = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.server.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ServiceConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[server]", "[image]", "[backend]", "[watermark]", "[logging]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        for key in ["server", "image", "backend", "watermark", "logging"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
