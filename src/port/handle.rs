//! Port lifecycle.
//!
//! A `PortHandle` only exists in the `Ready` state or later: `open_with`
//! walks Opening → Attributing → Ready and tears the device down again if any
//! step fails, so callers never see a half-configured port.

use super::attributes::TerminalAttributes;
use super::error::PortError;
use super::traits::{Backend, DeviceWaker, PortConfiguration, ReadOutcome, SerialDevice};
use super::unix::{UnixBackend, UnixDevice};
use super::validate::validate;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Lifecycle states. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortState {
    Unopened,
    Opening,
    Attributing,
    Ready,
    Closed,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Serial port on the host's terminal driver.
pub type SerialPort = PortHandle<UnixDevice>;

/// Requests a close from another thread.
///
/// A read blocked on the port returns [`PortError::EndOfStream`] promptly and
/// the owning handle releases the device. The OS handle itself stays with the
/// `PortHandle`; this only carries a flag and a waker.
#[derive(Clone)]
pub struct CloseHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<dyn DeviceWaker>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.requested.store(true, Ordering::Release);
        self.waker.wake();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// An open, configured serial device.
pub struct PortHandle<D: SerialDevice> {
    device: Option<D>,
    config: PortConfiguration,
    state: PortState,
    close_requested: Arc<AtomicBool>,
    waker: Arc<dyn DeviceWaker>,
}

impl SerialPort {
    /// Open a device on the host terminal driver.
    ///
    /// # Example
    /// ```no_run
    /// use serial_line::port::{PortConfiguration, SerialPort};
    /// use std::time::Duration;
    ///
    /// let config = PortConfiguration::new("/dev/ttyUSB0", 115200)
    ///     .read_timeout(Duration::from_millis(500));
    /// let mut port = SerialPort::open(config)?;
    /// port.write(b"AT\r")?;
    /// # Ok::<(), serial_line::port::PortError>(())
    /// ```
    pub fn open(config: PortConfiguration) -> Result<Self, PortError> {
        Self::open_with(&UnixBackend, config)
    }
}

impl<D: SerialDevice> PortHandle<D> {
    /// Open and configure a device through `backend`.
    pub fn open_with<B>(backend: &B, config: PortConfiguration) -> Result<Self, PortError>
    where
        B: Backend<Device = D>,
    {
        let mut state = PortState::Unopened;
        validate(&config)?;

        advance(&mut state, PortState::Opening, &config.name);
        let mut device = backend.open(&config.name).map_err(|source| PortError::Open {
            path: config.name.clone(),
            source,
        })?;

        advance(&mut state, PortState::Attributing, &config.name);
        if let Err(err) = configure(&mut device, &config) {
            teardown(device, &config.name);
            return Err(err);
        }

        advance(&mut state, PortState::Ready, &config.name);
        info!(
            port = %config.name,
            baud_rate = config.baud_rate,
            data_bits = config.data_bits,
            parity = %config.parity,
            stop_bits = %config.stop_bits,
            read_timeout = ?config.read_timeout,
            "serial port ready"
        );

        let waker = device.waker();
        Ok(Self {
            device: Some(device),
            config,
            state,
            close_requested: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// Device path.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration currently applied to the device.
    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// A handle that can close this port from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            requested: Arc::clone(&self.close_requested),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Read into `buffer` under the configured timeout discipline.
    ///
    /// `Ok(0)` means the timeout elapsed with nothing to read. A hangup on the
    /// line or a close requested through a [`CloseHandle`] yields
    /// [`PortError::EndOfStream`].
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let device = self.ready_device()?;
        if buffer.is_empty() {
            return Ok(0);
        }
        match device.read(buffer)? {
            ReadOutcome::Data(n) => {
                trace!(port = %self.config.name, bytes = n, "read");
                Ok(n)
            }
            ReadOutcome::TimedOut => Ok(0),
            ReadOutcome::Hangup => {
                debug!(port = %self.config.name, "peer hung up");
                Err(PortError::EndOfStream)
            }
            ReadOutcome::Woken => {
                self.close()?;
                Err(PortError::EndOfStream)
            }
        }
    }

    /// Queue `data` for transmission; returns the bytes the OS accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let written = self.ready_device()?.write(data)?;
        trace!(port = %self.config.name, bytes = written, "write");
        Ok(written)
    }

    /// Discard unread input and untransmitted output.
    ///
    /// This is not [`std::io::Write::flush`], which waits for output instead
    /// (see [`PortHandle::drain`]).
    pub fn flush(&mut self) -> Result<(), PortError> {
        self.ready_device()?.discard_buffers()?;
        debug!(port = %self.config.name, "discarded input and output queues");
        Ok(())
    }

    /// Block until everything written has been transmitted.
    pub fn drain(&mut self) -> Result<(), PortError> {
        self.ready_device()?.drain()?;
        Ok(())
    }

    /// Bytes waiting to be read, when the platform reports it.
    pub fn bytes_to_read(&self) -> Option<usize> {
        self.device.as_ref().and_then(SerialDevice::bytes_to_read)
    }

    /// Change the baud rate, reapplying the full attribute set.
    ///
    /// On failure the port keeps its previous configuration.
    pub fn set_speed(&mut self, baud_rate: u32) -> Result<(), PortError> {
        let mut config = self.config.clone();
        config.baud_rate = baud_rate;

        let device = self.ready_device()?;
        configure_attributes(device, &config)?;

        debug!(
            port = %config.name,
            from = self.config.baud_rate,
            to = baud_rate,
            "baud rate changed"
        );
        self.config = config;
        Ok(())
    }

    /// Release the device. Closing an already closed port succeeds.
    pub fn close(&mut self) -> Result<(), PortError> {
        let Some(device) = self.device.take() else {
            return Ok(());
        };
        self.state = PortState::Closed;
        device.close().map_err(|source| PortError::Close {
            path: self.config.name.clone(),
            source,
        })?;
        info!(port = %self.config.name, "serial port closed");
        Ok(())
    }

    /// The device, unless the port is closed. The operation that honours a
    /// pending close request sees `EndOfStream`; later ones see `Closed`.
    fn ready_device(&mut self) -> Result<&mut D, PortError> {
        if self.device.is_some() && self.close_requested.load(Ordering::Acquire) {
            self.close()?;
            return Err(PortError::EndOfStream);
        }
        self.device.as_mut().ok_or(PortError::Closed)
    }
}

impl<D: SerialDevice> Drop for PortHandle<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(port = %self.config.name, error = %err, "close on drop failed");
        }
    }
}

impl<D: SerialDevice> fmt::Debug for PortHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortHandle")
            .field("name", &self.config.name)
            .field("baud_rate", &self.config.baud_rate)
            .field("state", &self.state)
            .finish()
    }
}

impl<D: SerialDevice> io::Read for PortHandle<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match PortHandle::read(self, buf) {
            Ok(n) => Ok(n),
            // End of stream reads as EOF, like a closed file.
            Err(err) if err.is_end_of_stream() => Ok(0),
            Err(err) => Err(into_io_error(err)),
        }
    }
}

impl<D: SerialDevice> io::Write for PortHandle<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        PortHandle::write(self, buf).map_err(into_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain().map_err(into_io_error)
    }
}

fn into_io_error(err: PortError) -> io::Error {
    match err {
        PortError::Io(err) => err,
        PortError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
        other => io::Error::other(other),
    }
}

fn advance(state: &mut PortState, next: PortState, port: &str) {
    debug_assert!(next > *state, "port state cannot go from {state} to {next}");
    trace!(port, from = %state, to = %next, "port state");
    *state = next;
}

/// Attributing and the switch to blocking mode.
fn configure<D: SerialDevice>(device: &mut D, config: &PortConfiguration) -> Result<(), PortError> {
    configure_attributes(device, config)?;
    device.set_blocking()?;
    Ok(())
}

fn configure_attributes<D: SerialDevice>(
    device: &mut D,
    config: &PortConfiguration,
) -> Result<(), PortError> {
    let attributes = TerminalAttributes::derive(config)?;
    device
        .apply_attributes(&attributes)
        .map_err(|source| PortError::AttributeApply {
            path: config.name.clone(),
            source,
        })
}

/// Close a device that never became ready. The setup error is what the caller
/// sees, so a close failure here is only logged.
fn teardown<D: SerialDevice>(device: D, port: &str) {
    if let Err(err) = device.close() {
        warn!(port, error = %err, "failed to release device after setup error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::error::InvalidConfig;
    use crate::port::mock::{MockBackend, MockDevice};
    use crate::port::traits::Parity;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const PORT: &str = "/dev/mock0";

    fn open(
        backend: &MockBackend,
        config: PortConfiguration,
    ) -> Result<PortHandle<MockDevice>, PortError> {
        PortHandle::open_with(backend, config)
    }

    fn timed(millis: u64) -> PortConfiguration {
        PortConfiguration::new(PORT, 115200).read_timeout(Duration::from_millis(millis))
    }

    #[test]
    fn test_open_applies_attributes_then_blocks() {
        let backend = MockBackend::new();
        let port = open(&backend, timed(500)).unwrap();

        assert_eq!(port.state(), PortState::Ready);
        assert_eq!(backend.opened(), vec![PORT.to_string()]);
        let applied = backend.applied_attributes();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0], TerminalAttributes::derive(&timed(500)).unwrap());
        assert!(backend.is_blocking());
    }

    #[test]
    fn test_invalid_config_never_opens() {
        let backend = MockBackend::new();
        let err = open(&backend, PortConfiguration::new(PORT, 1)).unwrap_err();
        assert!(matches!(
            err,
            PortError::InvalidConfig(InvalidConfig::UnsupportedBaudRate(1))
        ));
        assert!(backend.opened().is_empty());
    }

    #[test]
    fn test_open_failure_is_reported_verbatim() {
        let backend = MockBackend::new();
        backend.fail_next_open(io::ErrorKind::PermissionDenied);
        match open(&backend, timed(100)) {
            Err(PortError::Open { path, source }) => {
                assert_eq!(path, PORT);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected open failure, got {other:?}"),
        }
        assert_eq!(backend.close_count(), 0);
    }

    #[test]
    fn test_attribute_failure_releases_device() {
        let backend = MockBackend::new();
        backend.fail_next_apply(io::ErrorKind::InvalidInput);
        let err = open(&backend, timed(100)).unwrap_err();
        assert!(matches!(err, PortError::AttributeApply { .. }));
        assert_eq!(backend.close_count(), 1);
        assert!(!backend.is_blocking());
    }

    #[test]
    fn test_timeout_read_returns_zero() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        let mut buffer = [0u8; 8];
        assert_eq!(port.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_read_and_write() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();

        backend.push_input(b"hello");
        let mut buffer = [0u8; 16];
        let n = port.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"hello");

        assert_eq!(port.write(b"world").unwrap(), 5);
        assert_eq!(backend.written(), b"world");
    }

    #[test]
    fn test_flush_discards_pending_input() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        backend.push_input(b"stale");
        assert_eq!(port.bytes_to_read(), Some(5));

        port.flush().unwrap();
        assert_eq!(backend.discard_count(), 1);
        let mut buffer = [0u8; 8];
        assert_eq!(port.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_set_speed_reapplies_everything() {
        let backend = MockBackend::new();
        let config = timed(300).parity(Parity::Even).data_bits(7);
        let mut port = open(&backend, config.clone()).unwrap();

        port.set_speed(9600).unwrap();
        assert_eq!(port.config().baud_rate, 9600);

        let applied = backend.applied_attributes();
        assert_eq!(applied.len(), 2);
        let mut expected = config;
        expected.baud_rate = 9600;
        assert_eq!(applied[1], TerminalAttributes::derive(&expected).unwrap());
        assert_eq!(applied[0].control_flags(), applied[1].control_flags());
        assert_eq!(applied[0].control_chars(), applied[1].control_chars());
    }

    #[test]
    fn test_set_speed_rejects_unsupported_rate() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        let err = port.set_speed(12345).unwrap_err();
        assert!(matches!(
            err,
            PortError::InvalidConfig(InvalidConfig::UnsupportedBaudRate(12345))
        ));
        assert_eq!(port.config().baud_rate, 115200);
        assert_eq!(backend.applied_attributes().len(), 1);
        assert_eq!(port.state(), PortState::Ready);
    }

    #[test]
    fn test_set_speed_apply_failure_keeps_config() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        backend.fail_next_apply(io::ErrorKind::Other);
        assert!(matches!(
            port.set_speed(9600),
            Err(PortError::AttributeApply { .. })
        ));
        assert_eq!(port.config().baud_rate, 115200);
        assert!(port.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        port.close().unwrap();
        port.close().unwrap();
        assert_eq!(port.state(), PortState::Closed);
        assert_eq!(backend.close_count(), 1);

        drop(port);
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn test_operations_after_close() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        port.close().unwrap();

        let mut buffer = [0u8; 4];
        assert!(matches!(port.read(&mut buffer), Err(PortError::Closed)));
        assert!(matches!(port.write(b"x"), Err(PortError::Closed)));
        assert!(matches!(port.flush(), Err(PortError::Closed)));
        assert!(matches!(port.set_speed(9600), Err(PortError::Closed)));
        assert_eq!(port.bytes_to_read(), None);
    }

    #[test]
    fn test_close_failure_is_reported() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        backend.fail_next_close(io::ErrorKind::Other);
        assert!(matches!(port.close(), Err(PortError::Close { .. })));
        assert!(!port.is_open());
        port.close().unwrap();
    }

    #[test]
    fn test_drop_closes_device() {
        let backend = MockBackend::new();
        drop(open(&backend, timed(100)).unwrap());
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn test_close_handle_unblocks_pending_read() {
        let backend = MockBackend::new();
        // Zero timeout: the read would block forever.
        let mut port = open(&backend, PortConfiguration::new(PORT, 9600)).unwrap();
        let closer = port.close_handle();

        let (started_tx, started_rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let reader = thread::spawn(move || {
            started_tx.send(()).unwrap();
            let mut buffer = [0u8; 8];
            let result = port.read(&mut buffer);
            done_tx.send(result.map_err(|e| e.to_string())).unwrap();
            port
        });

        started_rx.recv().unwrap();
        closer.close();

        let result = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("read did not return after close");
        assert_eq!(result, Err(PortError::EndOfStream.to_string()));

        let port = reader.join().unwrap();
        assert_eq!(port.state(), PortState::Closed);
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn test_close_request_before_io() {
        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        port.close_handle().close();
        assert!(matches!(port.write(b"late"), Err(PortError::EndOfStream)));
        assert!(matches!(port.write(b"later"), Err(PortError::Closed)));
        assert_eq!(backend.close_count(), 1);
        assert!(backend.written().is_empty());
    }

    #[test]
    fn test_io_traits() {
        use std::io::{Read, Write};

        let backend = MockBackend::new();
        let mut port = open(&backend, timed(100)).unwrap();
        backend.push_input(b"abc");

        let mut buffer = [0u8; 3];
        Read::read_exact(&mut port, &mut buffer).unwrap();
        assert_eq!(&buffer, b"abc");

        Write::write_all(&mut port, b"xyz").unwrap();
        Write::flush(&mut port).unwrap();
        assert_eq!(backend.drain_count(), 1);
        assert_eq!(backend.discard_count(), 0);
    }
}
