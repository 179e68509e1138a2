use crate::config::ConfigError;
use crate::discovery::DiscoveryError;
use crate::logging::LoggingError;
use crate::port::PortError;
use thiserror::Error;

/// Unified error type for the command line tool.
///
/// Library callers work with the layer errors directly; this only exists so
/// `main` can use `?` across all of them.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no device given and no [port] device configured")]
    NoDevice,

    #[error("a serialization error occurred: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("an I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for the command line tool.
pub type AppResult<T> = Result<T, AppError>;
