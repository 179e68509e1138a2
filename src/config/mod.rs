//! Configuration module for serial-line.
//!
//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LINE_CONFIG` environment variable (explicit path)
//! 2. `./serial-line.toml` (current directory)
//! 3. `serial-line.toml` in the platform config directory
//!    (`~/.config/serial-line/` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_LINE_<SECTION>_<KEY>`:
//! - `SERIAL_LINE_PORT_BAUD_RATE=9600`
//! - `SERIAL_LINE_PORT_PARITY=even`
//! - `SERIAL_LINE_DISCOVERY_STRATEGY=scan`
//!
//! `PORT0` and `PORT1` name the hardware link test pair.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_line::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Default baud: {}", config.port.baud_rate);
//! # Ok::<(), serial_line::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{
    Config, DiscoveryConfig, DiscoveryStrategy, LogFormat, LoggingConfig, PortDefaults,
    TestingConfig,
};
