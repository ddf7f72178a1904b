//! Process-wide logging setup
//!
//! Library code only emits `tracing` events; binaries and test harnesses
//! call [`init_logging`] once to route them somewhere.

use courier_common::error::CommonError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::loader::env_bool;

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, with the current span attached.
    Json,
    /// Multi-line human-readable output.
    #[default]
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `courier_core=debug,warn`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

impl LoggingConfig {
    /// Defaults overridden by `COURIER_LOG_LEVEL` and `COURIER_LOG_JSON`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("COURIER_LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.level = level;
            }
        }
        if env_bool("COURIER_LOG_JSON", false) {
            config.format = LogFormat::Json;
        }
        config
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Returns `Ok(false)` when a
/// global subscriber was already installed, leaving it untouched.
///
/// # Errors
/// Returns `CommonError::Config` when `config.level` is not a valid filter
/// directive.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, CommonError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty().with_target(true)).try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::info!(level = %config.level, format = ?config.format, "logging initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, CommonError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        CommonError::config_field("logging.level", format!("invalid filter '{}': {e}", config.level))
    })
}
