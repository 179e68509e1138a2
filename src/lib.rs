//! Serial Line Library
//!
//! Opens and configures serial devices through the host terminal driver and
//! exposes them as plain blocking byte streams.
//!
//! # Modules
//!
//! - `port`: configuration validation, terminal attribute mapping and the
//!   port lifecycle
//! - `discovery`: listing candidate device paths
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: unified error handling for the command line tool

pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use discovery::{DiscoveryError, PortDiscovery};
pub use error::{AppError, AppResult};
pub use port::{InvalidConfig, Parity, PortConfiguration, PortError, StopBits};

#[cfg(unix)]
pub use port::{CloseHandle, PortHandle, PortState, SerialPort, TerminalAttributes};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
