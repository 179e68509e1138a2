//! Platform enumeration through the `serialport` crate.

use super::{normalize, DiscoveryError, PortDiscovery};
use tracing::debug;

/// Platforms where `serialport` has a native enumeration strategy.
const PLATFORM_SUPPORTED: bool = cfg!(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
));

/// Asks the OS for its serial devices: sysfs on Linux, IOKit on macOS, the
/// registry on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDiscovery;

impl PortDiscovery for SystemDiscovery {
    fn name(&self) -> &'static str {
        "system"
    }

    fn enumerate(&self) -> Result<Vec<String>, DiscoveryError> {
        if !PLATFORM_SUPPORTED {
            return Err(DiscoveryError::unsupported());
        }
        let ports = serialport::available_ports()?;
        debug!(count = ports.len(), "system enumeration");
        Ok(normalize(ports.into_iter().map(|port| port.port_name)))
    }
}
