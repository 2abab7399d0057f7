//! Logger Construction
//!
//! Installs the global `tracing` subscriber from [`LoggingConfig`].
//! `RUST_LOG`, when set, takes precedence over the configured level.

use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Errors that can occur while installing the logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("failed to open log output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install logger: {0}")]
    Init(String),
}

/// Parses a configured level name, case-insensitively.
pub fn parse_level(level: &str) -> Result<Level, LoggingError> {
    Level::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Installs the global subscriber. Can only succeed once per process.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_level(&config.level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match config.output.as_str() {
        "stdout" => builder.with_writer(std::io::stdout).try_init(),
        "stderr" => builder.with_writer(std::io::stderr).try_init(),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::Output {
                    path: path.to_string(),
                    source,
                })?;
            builder
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
