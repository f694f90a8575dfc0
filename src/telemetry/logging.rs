//! Tracing subscriber setup.
//!
//! JSON output for production, pretty printing for development, selected by
//! `ADASPLIT_LOG_FORMAT`. Installed once by the embedding application; the
//! router itself only emits events.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ADASPLIT_LOG_FORMAT` | json | `json` or `pretty` |
//! | `ADASPLIT_LOG_LEVEL` | info | `EnvFilter` directive, e.g. `adasplit=debug` |
//! | `ADASPLIT_LOG_FILE` | (none) | Log file path; stderr when unset |

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. "info" or "adasplit=debug".
    pub filter: String,
    /// Log file path; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, filter: "info".to_string(), file: None }
    }
}

impl LogConfig {
    /// Load from `ADASPLIT_LOG_*` environment variables. Unrecognized format
    /// values fall back to JSON.
    pub fn from_env() -> Self {
        let format = match std::env::var("ADASPLIT_LOG_FORMAT").as_deref() {
            Ok("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        let filter = std::env::var("ADASPLIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let file = std::env::var("ADASPLIT_LOG_FILE").ok().map(PathBuf::from);
        Self { format, filter, file }
    }
}

/// Errors from logging initialization.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to open log file: {0}")]
    FileOpen(String),

    #[error("subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber. Call once at startup; a second
/// call fails with [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match (config.format, &config.file) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
            registry
                .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
                .try_init()
                .map_err(|_| LogError::AlreadyInitialized)
        }
        (LogFormat::Json, None) => registry
            .with(fmt::layer().json())
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
        (LogFormat::Pretty, _) => registry
            .with(fmt::layer().pretty())
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
    }
}
