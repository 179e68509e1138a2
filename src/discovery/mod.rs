//! Serial device discovery.
//!
//! Discovery produces candidate device paths for [`crate::port::PortHandle`];
//! it never opens anything. Strategies implement [`PortDiscovery`] and can be
//! chained with [`FallbackDiscovery`].

use crate::config::{DiscoveryConfig, DiscoveryStrategy};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

pub mod scan;
pub mod system;

pub use scan::DeviceDirScan;
pub use system::SystemDiscovery;

/// Errors that can occur while enumerating devices.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No enumeration strategy is known for this platform.
    #[error("serial port discovery is not supported on {platform}")]
    Unsupported { platform: &'static str },

    /// The platform enumeration API failed.
    #[error("port enumeration failed: {0}")]
    Probe(#[from] serialport::Error),

    /// A device directory could not be read.
    #[error("failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    pub(crate) fn unsupported() -> Self {
        Self::Unsupported {
            platform: std::env::consts::OS,
        }
    }
}

/// A way of finding candidate device paths.
#[cfg_attr(test, mockall::automock)]
pub trait PortDiscovery {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Candidate device paths, sorted and without duplicates.
    fn enumerate(&self) -> Result<Vec<String>, DiscoveryError>;
}

/// Sort and de-duplicate device paths.
pub(crate) fn normalize(paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut paths: Vec<String> = paths.into_iter().collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Tries `primary`, then `fallback` when the primary fails or finds nothing.
#[derive(Debug, Clone)]
pub struct FallbackDiscovery<P, F> {
    primary: P,
    fallback: F,
}

impl<P: PortDiscovery, F: PortDiscovery> FallbackDiscovery<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: PortDiscovery, F: PortDiscovery> PortDiscovery for FallbackDiscovery<P, F> {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn enumerate(&self) -> Result<Vec<String>, DiscoveryError> {
        match self.primary.enumerate() {
            Ok(paths) if !paths.is_empty() => Ok(paths),
            Ok(paths) => {
                debug!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "primary discovery found nothing, trying fallback"
                );
                Ok(self.fallback.enumerate().unwrap_or(paths))
            }
            Err(primary_err) => {
                warn!(
                    primary = self.primary.name(),
                    error = %primary_err,
                    "primary discovery failed, trying fallback"
                );
                // When both fail the primary error is the informative one.
                self.fallback.enumerate().map_err(|_| primary_err)
            }
        }
    }
}

/// Platform enumeration with a device directory scan behind it.
pub fn default_discovery() -> FallbackDiscovery<SystemDiscovery, DeviceDirScan> {
    FallbackDiscovery::new(SystemDiscovery, DeviceDirScan::platform_default())
}

/// Build the strategy selected by a `[discovery]` section.
pub fn from_config(config: &DiscoveryConfig) -> Box<dyn PortDiscovery> {
    let scan = DeviceDirScan::platform_default()
        .with_root(&config.scan_root)
        .with_prefixes(config.extra_prefixes.iter().cloned());
    match config.strategy {
        DiscoveryStrategy::Auto => Box::new(FallbackDiscovery::new(SystemDiscovery, scan)),
        DiscoveryStrategy::System => Box::new(SystemDiscovery),
        DiscoveryStrategy::Scan => Box::new(scan),
    }
}

/// Candidate device paths for this host.
pub fn enumerate() -> Result<Vec<String>, DiscoveryError> {
    default_discovery().enumerate()
}
