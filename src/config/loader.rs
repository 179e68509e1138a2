//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, DiscoveryStrategy, LogFormat};
use crate::port::{Parity, StopBits};
use clap::ValueEnum;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_LINE";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-line.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_LINE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LINE_CONFIG` environment variable (explicit path)
    /// 2. `./serial-line.toml` (current directory)
    /// 3. `serial-line.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        debug!(path = ?config_path, "configuration loaded");

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides, ignoring any file.
    pub fn with_defaults() -> ConfigResult<Self> {
        let mut config = Config::default();
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: None,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Write the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    default_config_path().filter(|path| path.exists())
}

/// Where a new config file should be written on this host.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-line").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_key(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

fn parse_number<T: FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("invalid number '{value}'")))
}

fn parse_choice<T: ValueEnum>(var: &str, value: &str) -> ConfigResult<T> {
    T::from_str(value.trim(), true).map_err(|message| ConfigError::env_parse(var, message))
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `SERIAL_LINE_<SECTION>_<KEY>`, e.g.
/// `SERIAL_LINE_PORT_BAUD_RATE=9600`. `PORT0` and `PORT1` are accepted as
/// aliases for the testing pair.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Port overrides
    if let Ok(val) = std::env::var(env_key("PORT_DEVICE")) {
        config.port.device = Some(val);
    }
    let var = env_key("PORT_BAUD_RATE");
    if let Ok(val) = std::env::var(&var) {
        config.port.baud_rate = parse_number(&var, &val)?;
    }
    let var = env_key("PORT_DATA_BITS");
    if let Ok(val) = std::env::var(&var) {
        config.port.data_bits = parse_number(&var, &val)?;
    }
    let var = env_key("PORT_PARITY");
    if let Ok(val) = std::env::var(&var) {
        config.port.parity = parse_choice::<Parity>(&var, &val)?;
    }
    let var = env_key("PORT_STOP_BITS");
    if let Ok(val) = std::env::var(&var) {
        config.port.stop_bits = parse_choice::<StopBits>(&var, &val)?;
    }
    let var = env_key("PORT_READ_TIMEOUT_MS");
    if let Ok(val) = std::env::var(&var) {
        config.port.read_timeout_ms = parse_number(&var, &val)?;
    }

    // Discovery overrides
    let var = env_key("DISCOVERY_STRATEGY");
    if let Ok(val) = std::env::var(&var) {
        config.discovery.strategy = parse_choice::<DiscoveryStrategy>(&var, &val)?;
    }
    if let Ok(val) = std::env::var(env_key("DISCOVERY_SCAN_ROOT")) {
        config.discovery.scan_root = PathBuf::from(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var(env_key("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    let var = env_key("LOGGING_FORMAT");
    if let Ok(val) = std::env::var(&var) {
        config.logging.format = parse_choice::<LogFormat>(&var, &val)?;
    }

    // Testing overrides (also support legacy PORT0/PORT1)
    if let Ok(val) = std::env::var(env_key("TESTING_PORT0")).or_else(|_| std::env::var("PORT0")) {
        config.testing.port0 = Some(val);
    }
    if let Ok(val) = std::env::var(env_key("TESTING_PORT1")).or_else(|_| std::env::var("PORT1")) {
        config.testing.port1 = Some(val);
    }
    let var = env_key("TESTING_BAUD");
    if let Ok(val) = std::env::var(&var) {
        config.testing.baud = parse_number(&var, &val)?;
    }
    if let Ok(val) = std::env::var(env_key("TESTING_SOCAT")) {
        config.testing.socat = val;
    }

    Ok(())
}
