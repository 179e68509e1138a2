//! Up-front configuration checks.
//!
//! Runs before a device is opened so a bad field costs nothing and the caller
//! learns which field to fix. Fields are checked in a fixed order: baud rate,
//! data bits, stop bits, parity.

use super::attributes::speed_code;
use super::error::InvalidConfig;
use super::traits::{Parity, PortConfiguration, StopBits};

/// Check every field against the supported value sets.
pub fn validate(config: &PortConfiguration) -> Result<(), InvalidConfig> {
    if speed_code(config.baud_rate).is_none() {
        return Err(InvalidConfig::UnsupportedBaudRate(config.baud_rate));
    }

    if !(5..=8).contains(&config.data_bits) {
        return Err(InvalidConfig::UnsupportedDataBits(config.data_bits));
    }

    match config.stop_bits {
        StopBits::One | StopBits::Two => {}
        other => return Err(InvalidConfig::UnsupportedStopBits(other)),
    }

    match config.parity {
        Parity::None | Parity::Odd | Parity::Even => Ok(()),
        other => Err(InvalidConfig::UnsupportedParity(other)),
    }
}
