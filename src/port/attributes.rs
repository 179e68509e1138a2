//! Configuration to terminal attribute mapping.
//!
//! `TerminalAttributes::derive` turns a `PortConfiguration` into the flag
//! words, speed code and control characters the terminal driver expects. The
//! result is a plain value: deriving twice from the same configuration yields
//! equal attributes, and nothing here touches a device.
//!
//! # Read timeout discipline
//!
//! The read timeout is expressed through `VMIN` (bytes) and `VTIME` (tenths of
//! a second). Tenths are truncated, then clamped to what fits in a `cc_t`.
//!
//! | read timeout          | VMIN | VTIME        | `read` returns                                   |
//! |-----------------------|------|--------------|--------------------------------------------------|
//! | `0`                   | 1    | 0            | once at least one byte is available, never early |
//! | `1ns ..= 199ms`       | 0    | 1            | on first byte, or empty after 0.1 s              |
//! | `200ms ..= 25.599s`   | 0    | `ms / 100`   | on first byte, or empty after `VTIME` tenths     |
//! | `>= 25.6s`            | 0    | 255          | on first byte, or empty after 25.5 s             |

use super::error::InvalidConfig;
use super::traits::{Parity, PortConfiguration, StopBits};
use std::time::Duration;

/// Upper bound of `VTIME`, in tenths of a second.
pub const MAX_TIMEOUT_DECISECONDS: u8 = u8::MAX;

/// Supported baud rates and their speed codes, sorted by rate.
#[cfg(target_os = "linux")]
const BAUD_TABLE: &[(u32, libc::speed_t)] = &[
    (50, libc::B50),
    (75, libc::B75),
    (110, libc::B110),
    (134, libc::B134),
    (150, libc::B150),
    (200, libc::B200),
    (300, libc::B300),
    (600, libc::B600),
    (1200, libc::B1200),
    (1800, libc::B1800),
    (2400, libc::B2400),
    (4800, libc::B4800),
    (9600, libc::B9600),
    (19200, libc::B19200),
    (38400, libc::B38400),
    (57600, libc::B57600),
    (115200, libc::B115200),
    (230400, libc::B230400),
    (460800, libc::B460800),
    (500000, libc::B500000),
    (576000, libc::B576000),
    (921600, libc::B921600),
    (1000000, libc::B1000000),
    (1152000, libc::B1152000),
    (1500000, libc::B1500000),
    (2000000, libc::B2000000),
    (2500000, libc::B2500000),
    (3000000, libc::B3000000),
    (3500000, libc::B3500000),
    (4000000, libc::B4000000),
];

#[cfg(not(target_os = "linux"))]
const BAUD_TABLE: &[(u32, libc::speed_t)] = &[
    (50, libc::B50),
    (75, libc::B75),
    (110, libc::B110),
    (134, libc::B134),
    (150, libc::B150),
    (200, libc::B200),
    (300, libc::B300),
    (600, libc::B600),
    (1200, libc::B1200),
    (1800, libc::B1800),
    (2400, libc::B2400),
    (4800, libc::B4800),
    (9600, libc::B9600),
    (19200, libc::B19200),
    (38400, libc::B38400),
    (57600, libc::B57600),
    (115200, libc::B115200),
    (230400, libc::B230400),
];

/// Speed code for a baud rate, if the platform supports it.
pub fn speed_code(baud_rate: u32) -> Option<libc::speed_t> {
    BAUD_TABLE
        .binary_search_by_key(&baud_rate, |&(rate, _)| rate)
        .ok()
        .map(|index| BAUD_TABLE[index].1)
}

/// All baud rates this platform can program, ascending.
pub fn supported_baud_rates() -> impl Iterator<Item = u32> {
    BAUD_TABLE.iter().map(|&(rate, _)| rate)
}

/// `(VMIN, VTIME)` for a read timeout. See the module table.
pub fn timeout_control_chars(read_timeout: Duration) -> (u8, u8) {
    if read_timeout.is_zero() {
        return (1, 0);
    }
    let tenths = read_timeout.as_millis() / 100;
    let tenths = tenths.clamp(1, u128::from(MAX_TIMEOUT_DECISECONDS));
    (0, tenths as u8)
}

/// Terminal attributes derived from a `PortConfiguration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalAttributes {
    control_flags: libc::tcflag_t,
    input_flags: libc::tcflag_t,
    speed: libc::speed_t,
    control_chars: [libc::cc_t; libc::NCCS],
}

impl TerminalAttributes {
    /// Map a configuration onto terminal attributes.
    pub fn derive(config: &PortConfiguration) -> Result<Self, InvalidConfig> {
        let speed = speed_code(config.baud_rate)
            .ok_or(InvalidConfig::UnsupportedBaudRate(config.baud_rate))?;

        // Direct point-to-point link: no carrier detect, receiver on.
        let mut control_flags = libc::CREAD | libc::CLOCAL;

        control_flags |= match config.data_bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            8 => libc::CS8,
            other => return Err(InvalidConfig::UnsupportedDataBits(other)),
        };

        match config.stop_bits {
            StopBits::One => {}
            StopBits::Two => control_flags |= libc::CSTOPB,
            other => return Err(InvalidConfig::UnsupportedStopBits(other)),
        }

        match config.parity {
            Parity::None => {}
            Parity::Odd => control_flags |= libc::PARENB | libc::PARODD,
            Parity::Even => control_flags |= libc::PARENB,
            other => return Err(InvalidConfig::UnsupportedParity(other)),
        }

        let (min_bytes, timeout) = timeout_control_chars(config.read_timeout);
        let mut control_chars = [0; libc::NCCS];
        control_chars[libc::VMIN] = min_bytes;
        control_chars[libc::VTIME] = timeout;

        Ok(Self {
            control_flags,
            input_flags: libc::IGNPAR,
            speed,
            control_chars,
        })
    }

    pub fn control_flags(&self) -> libc::tcflag_t {
        self.control_flags
    }

    pub fn input_flags(&self) -> libc::tcflag_t {
        self.input_flags
    }

    /// Speed code applied to both directions.
    pub fn speed(&self) -> libc::speed_t {
        self.speed
    }

    pub fn control_chars(&self) -> [libc::cc_t; libc::NCCS] {
        self.control_chars
    }

    /// `VMIN`.
    pub fn min_bytes(&self) -> u8 {
        self.control_chars[libc::VMIN]
    }

    /// `VTIME`, in tenths of a second.
    pub fn timeout_deciseconds(&self) -> u8 {
        self.control_chars[libc::VTIME]
    }

    /// How long a read may wait with nothing available; `None` blocks.
    pub fn read_deadline(&self) -> Option<Duration> {
        if self.min_bytes() > 0 && self.timeout_deciseconds() == 0 {
            None
        } else {
            Some(Duration::from_millis(
                u64::from(self.timeout_deciseconds()) * 100,
            ))
        }
    }
}
