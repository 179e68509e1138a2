//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration.

use crate::port::{Parity, PortConfiguration, StopBits, DEFAULT_DATA_BITS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line settings used when a command does not give its own
    pub port: PortDefaults,
    /// How candidate devices are found
    pub discovery: DiscoveryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Link test configuration
    pub testing: TestingConfig,
}

/// `[port]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortDefaults {
    /// Device used when none is named
    pub device: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Read timeout in milliseconds; 0 blocks until data arrives
    pub read_timeout_ms: u64,
    /// Short names for device paths, e.g. `gps = "/dev/ttyACM0"`
    pub aliases: BTreeMap<String, String>,
}

impl Default for PortDefaults {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 115_200,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: 0,
            aliases: BTreeMap::new(),
        }
    }
}

impl PortDefaults {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Resolve a device name through aliases
    pub fn resolve_device(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Build a full port configuration for `name` from these defaults.
    pub fn to_port_configuration(&self, name: &str) -> PortConfiguration {
        PortConfiguration::new(self.resolve_device(name), self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .read_timeout(self.read_timeout())
    }
}

/// Which discovery strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Platform enumeration, falling back to a directory scan
    #[default]
    Auto,
    /// Platform enumeration only
    System,
    /// Directory scan only
    Scan,
}

/// `[discovery]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub strategy: DiscoveryStrategy,
    /// Directory searched by the scan strategy
    pub scan_root: PathBuf,
    /// Name prefixes added to the platform list
    pub extra_prefixes: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::Auto,
            scan_root: PathBuf::from("/dev"),
            extra_prefixes: Vec::new(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `serial_line=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// `[testing]` section, read by the link tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// First end of a physically connected pair
    pub port0: Option<String>,
    /// Second end of the pair
    pub port1: Option<String>,
    pub baud: u32,
    /// socat executable used for virtual links
    pub socat: String,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port0: None,
            port1: None,
            baud: 115_200,
            socat: "socat".to_string(),
        }
    }
}

impl TestingConfig {
    /// Both ends of the hardware pair, if configured.
    pub fn link(&self) -> Option<(&str, &str)> {
        Some((self.port0.as_deref()?, self.port1.as_deref()?))
    }
}
