//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by the `[logging]`
//! level. A `RUST_LOG` environment variable takes precedence over the config
//! file so operators can raise verbosity without editing it.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Filter from `RUST_LOG` if set, otherwise from the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|source| LoggingError::Filter {
        directive: config.level.clone(),
        source,
    })
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedding).
pub fn init(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config)?)
        .with_ansi(config.ansi)
        .with_target(false)
        .finish();
    Ok(tracing::subscriber::set_global_default(subscriber).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_builds_filter() {
        let config = LoggingConfig {
            level: "oss_image_process=debug,warn".into(),
            ansi: false,
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn second_init_is_not_an_error() {
        let config = LoggingConfig::default();
        let _ = init(&config).unwrap();
        assert!(!init(&config).unwrap());
    }
}
