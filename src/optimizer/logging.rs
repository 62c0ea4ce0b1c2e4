//! Structured logging setup.
//!
//! Components log through `tracing` with structured fields; this module
//! wires the subscriber: an env-filtered stdout layer plus an optional
//! daily-rolling JSON file via `tracing-appender`.
//!
//! ```bash
//! # Debug only the engine module
//! RUST_LOG=giftcard_pricing::optimizer::engine=debug price_optimizer run
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (best for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default level when RUST_LOG is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Format for stdout logging.
    #[serde(default)]
    pub format: LogFormat,

    /// File name for rolling JSON logs; stdout only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    /// Directory for log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_file: None,
            log_dir: default_log_dir(),
        }
    }
}

/// Initialize logging based on configuration.
///
/// Returns the appender guard when file logging is enabled; it must be kept
/// alive for the duration of the program so buffered lines are flushed.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let base_filter = if let Some(filter) = env_filter_override {
        EnvFilter::new(filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    if let Some(ref log_file) = config.log_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, log_file);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false).json();

        match config.format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().compact())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(base_filter)
                    .with(file_layer)
                    .with(fmt::layer().with_target(false))
                    .init();
            }
        }
        Ok(Some(guard))
    } else {
        match config.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .json()
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .with_target(false)
                    .init();
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");

        let parsed: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(parsed, LogFormat::Compact);
    }
}
