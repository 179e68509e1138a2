//! Tracing subscriber setup for the command line tool.
//!
//! Log lines go to stderr so that data printed by `read` stays clean on
//! stdout. `RUST_LOG`, when set, replaces the configured level.

use crate::config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

type FilteredRegistry = Layered<EnvFilter, Registry>;

fn build_filter(level: &str, env_override: Option<&str>) -> Result<EnvFilter, ParseError> {
    match env_override {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(level),
    }
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<FilteredRegistry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

/// Install the global subscriber described by `[logging]`.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.level, rust_log.as_deref())?;

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config.format))
        .try_init()?;
    Ok(())
}
