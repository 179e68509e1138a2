//! Core types and traits for serial port abstraction.
//!
//! `PortConfiguration` is the declarative input; `SerialDevice` and `Backend`
//! are the seam between the port state machine and the platform, so the same
//! lifecycle runs against a real tty or the in-memory mock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[cfg(unix)]
use super::attributes::TerminalAttributes;
#[cfg(unix)]
use std::{io, sync::Arc};

/// Default character size.
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub name: String,

    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: u8,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Read timeout. Zero blocks until at least one byte arrives.
    pub read_timeout: Duration,
}

impl PortConfiguration {
    /// 8N1 at the given rate with fully blocking reads.
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            baud_rate,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::ZERO,
        }
    }

    pub fn data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// Parity checking modes.
///
/// `Mark` and `Space` exist so configurations coming from files or the
/// command line can be represented and then rejected with a field-specific
/// error; the terminal mapping only supports `None`, `Odd` and `Even`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        f.write_str(name)
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum StopBits {
    #[serde(rename = "1")]
    #[value(name = "1")]
    One,
    #[serde(rename = "1.5")]
    #[value(name = "1.5")]
    OnePointFive,
    #[serde(rename = "2")]
    #[value(name = "2")]
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        };
        f.write_str(name)
    }
}

/// Result of a single device read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were placed into the buffer.
    Data(usize),
    /// The programmed timeout elapsed with nothing to read.
    TimedOut,
    /// The other end of the line went away.
    Hangup,
    /// A close was requested from another thread.
    Woken,
}

/// Wakes a device blocked in `read` from another thread.
#[cfg(unix)]
pub trait DeviceWaker: Send + Sync + fmt::Debug {
    fn wake(&self);
}

/// An open character device, exclusively owned by one `PortHandle`.
///
/// Implementations are opened in non-blocking mode; the handle switches them
/// to blocking mode once attributes are in place.
#[cfg(unix)]
pub trait SerialDevice: Send + fmt::Debug {
    /// Program the line discipline.
    fn apply_attributes(&mut self, attributes: &TerminalAttributes) -> io::Result<()>;

    /// Leave the non-blocking mode used during setup.
    fn set_blocking(&mut self) -> io::Result<()>;

    /// Read under the timeout discipline of the last applied attributes.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Queue bytes for transmission.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Drop unread input and untransmitted output.
    fn discard_buffers(&mut self) -> io::Result<()>;

    /// Block until queued output has been transmitted.
    fn drain(&mut self) -> io::Result<()>;

    /// Bytes waiting in the input queue, if the platform can tell.
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }

    /// Shared waker that interrupts a pending `read`.
    fn waker(&self) -> Arc<dyn DeviceWaker>;

    /// Release the OS handle.
    fn close(self) -> io::Result<()>;
}

/// Opens devices by path.
#[cfg(unix)]
pub trait Backend {
    type Device: SerialDevice;

    /// Open read-write, without acquiring a controlling terminal, in
    /// non-blocking mode.
    fn open(&self, path: &str) -> io::Result<Self::Device>;
}
