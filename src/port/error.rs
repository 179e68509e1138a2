//! Port-specific error types.
//!
//! Configuration faults are detected before the device is touched and are kept
//! in their own enum so callers can match on the offending field. Everything
//! that involves the OS carries the device path and the raw `io::Error`.

use super::traits::{Parity, StopBits};
use std::io;
use thiserror::Error;

/// A configuration field outside the supported value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidConfig {
    /// The baud rate has no speed code on this platform.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// Data bits other than 5, 6, 7 or 8.
    #[error("unsupported data bits: {0} (expected 5, 6, 7 or 8)")]
    UnsupportedDataBits(u8),

    /// Stop bits the terminal driver cannot express.
    #[error("unsupported stop bits: {0}")]
    UnsupportedStopBits(StopBits),

    /// Parity the terminal driver cannot express.
    #[error("unsupported parity: {0}")]
    UnsupportedParity(Parity),
}

impl InvalidConfig {
    /// Name of the configuration field that was rejected.
    pub fn field(&self) -> &'static str {
        match self {
            Self::UnsupportedBaudRate(_) => "baud_rate",
            Self::UnsupportedDataBits(_) => "data_bits",
            Self::UnsupportedStopBits(_) => "stop_bits",
            Self::UnsupportedParity(_) => "parity",
        }
    }
}

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The configuration was rejected before any OS call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] InvalidConfig),

    /// The device could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The OS rejected the terminal attributes. The device has been released.
    #[error("failed to apply terminal attributes to {path}: {source}")]
    AttributeApply {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Read, write, flush or mode switch failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer hung up, or the port was closed while a read was pending.
    #[error("end of stream")]
    EndOfStream,

    /// The port has already been closed.
    #[error("port is closed")]
    Closed,

    /// Releasing the OS handle failed. The handle is gone either way.
    #[error("failed to close {path}: {source}")]
    Close {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl PortError {
    /// Raw OS error code, when the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. }
            | Self::AttributeApply { source, .. }
            | Self::Close { source, .. }
            | Self::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for the two ways a port stops serving data.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Closed)
    }
}
