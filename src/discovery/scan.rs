//! Device directory scan.
//!
//! Lists entries of a device directory whose names start with a known serial
//! prefix. Nothing is opened or probed, so the result is a list of plausible
//! candidates rather than a guarantee.

use super::{normalize, DiscoveryError, PortDiscovery};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serial device name prefixes under `/dev` on this platform.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const PLATFORM_PREFIXES: &[&str] = &["ttyS", "ttyUSB", "ttyACM", "ttyAMA", "rfcomm"];

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const PLATFORM_PREFIXES: &[&str] = &["cu.", "tty."];

#[cfg(target_os = "freebsd")]
pub const PLATFORM_PREFIXES: &[&str] = &["cuau", "cuaU", "ttyu", "ttyU"];

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
pub const PLATFORM_PREFIXES: &[&str] = &[];

/// Scans a directory for names with serial prefixes.
#[derive(Debug, Clone)]
pub struct DeviceDirScan {
    root: PathBuf,
    prefixes: Vec<String>,
}

impl DeviceDirScan {
    pub fn new(root: impl Into<PathBuf>, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            root: root.into(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// `/dev` with this platform's prefixes. Empty on unknown platforms.
    pub fn platform_default() -> Self {
        Self::new("/dev", PLATFORM_PREFIXES.iter().copied())
    }

    /// Add prefixes, e.g. for USB adapters with unusual driver names.
    pub fn with_prefixes(mut self, extra: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prefixes.extend(extra.into_iter().map(Into::into));
        self
    }

    /// Scan a different directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl PortDiscovery for DeviceDirScan {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn enumerate(&self) -> Result<Vec<String>, DiscoveryError> {
        if self.prefixes.is_empty() {
            return Err(DiscoveryError::unsupported());
        }

        let io_error = |source| DiscoveryError::Io {
            path: self.root.clone(),
            source,
        };

        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if self.matches(name) {
                found.push(entry.path().to_string_lossy().into_owned());
            }
        }
        debug!(root = %self.root.display(), count = found.len(), "device directory scan");
        Ok(normalize(found))
    }
}
