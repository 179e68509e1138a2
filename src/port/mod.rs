//! Port abstraction layer for serial communication.
//!
//! The lifecycle in [`PortHandle`] is written once against the
//! [`SerialDevice`] and [`Backend`] traits. The host implementation drives the
//! terminal driver through `libc`; [`MockBackend`] records what a port did for
//! tests.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod attributes;
#[cfg(unix)]
pub mod handle;
#[cfg(unix)]
pub mod mock;
#[cfg(unix)]
pub mod unix;
#[cfg(unix)]
pub mod validate;

pub use error::{InvalidConfig, PortError};
pub use traits::*;

#[cfg(unix)]
pub use attributes::{speed_code, supported_baud_rates, timeout_control_chars, TerminalAttributes};
#[cfg(unix)]
pub use handle::{CloseHandle, PortHandle, PortState, SerialPort};
#[cfg(unix)]
pub use mock::{MockBackend, MockDevice};
#[cfg(unix)]
pub use unix::{UnixBackend, UnixDevice};
#[cfg(unix)]
pub use validate::validate;
