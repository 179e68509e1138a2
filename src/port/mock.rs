//! Mock device backend for testing.
//!
//! `MockBackend` opens in-memory devices that share one recorder, so a test
//! can drive a `PortHandle` and then inspect every attribute set, write,
//! discard and close it caused. Failures can be injected per step.

use super::attributes::TerminalAttributes;
use super::traits::{Backend, DeviceWaker, ReadOutcome, SerialDevice};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything the mock devices did, plus pending failures.
#[derive(Debug, Default)]
struct MockPortState {
    opened: Vec<String>,
    applied: Vec<TerminalAttributes>,
    blocking: bool,
    /// Bytes returned by subsequent reads.
    read_queue: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    discards: usize,
    drains: usize,
    closes: usize,
    woken: bool,
    fail_open: Option<io::ErrorKind>,
    fail_apply: Option<io::ErrorKind>,
    fail_close: Option<io::ErrorKind>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockPortState>,
    readable: Condvar,
}

/// Backend that hands out [`MockDevice`]s.
///
/// # Example
/// ```
/// use serial_line::port::{MockBackend, PortConfiguration, PortHandle};
/// use std::time::Duration;
///
/// let backend = MockBackend::new();
/// let config = PortConfiguration::new("MOCK0", 9600).read_timeout(Duration::from_millis(100));
/// let mut port = PortHandle::open_with(&backend, config).unwrap();
///
/// backend.push_input(b"Hello");
/// let mut buffer = [0u8; 8];
/// let n = port.read(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
///
/// port.write(b"Response").unwrap();
/// assert_eq!(backend.written(), b"Response");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    shared: Arc<Shared>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue bytes for the device to return on read.
    pub fn push_input(&self, data: &[u8]) {
        self.shared.state.lock().read_queue.extend(data);
        self.shared.readable.notify_all();
    }

    /// Every path passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        self.shared.state.lock().opened.clone()
    }

    /// Every attribute set applied, in order.
    pub fn applied_attributes(&self) -> Vec<TerminalAttributes> {
        self.shared.state.lock().applied.clone()
    }

    /// Whether the last device left non-blocking setup mode.
    pub fn is_blocking(&self) -> bool {
        self.shared.state.lock().blocking
    }

    /// All written bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.shared.state.lock().write_log.concat()
    }

    /// Each write call's payload.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    pub fn discard_count(&self) -> usize {
        self.shared.state.lock().discards
    }

    pub fn drain_count(&self) -> usize {
        self.shared.state.lock().drains
    }

    pub fn close_count(&self) -> usize {
        self.shared.state.lock().closes
    }

    pub fn fail_next_open(&self, kind: io::ErrorKind) {
        self.shared.state.lock().fail_open = Some(kind);
    }

    pub fn fail_next_apply(&self, kind: io::ErrorKind) {
        self.shared.state.lock().fail_apply = Some(kind);
    }

    pub fn fail_next_close(&self, kind: io::ErrorKind) {
        self.shared.state.lock().fail_close = Some(kind);
    }
}

impl Backend for MockBackend {
    type Device = MockDevice;

    fn open(&self, path: &str) -> io::Result<MockDevice> {
        let mut state = self.shared.state.lock();
        if let Some(kind) = state.fail_open.take() {
            return Err(io::Error::new(kind, "injected open failure"));
        }
        state.opened.push(path.to_string());
        state.blocking = false;
        state.woken = false;
        Ok(MockDevice {
            shared: Arc::clone(&self.shared),
            read_deadline: None,
        })
    }
}

/// In-memory device opened by [`MockBackend`].
#[derive(Debug)]
pub struct MockDevice {
    shared: Arc<Shared>,
    read_deadline: Option<Duration>,
}

impl SerialDevice for MockDevice {
    fn apply_attributes(&mut self, attributes: &TerminalAttributes) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        if let Some(kind) = state.fail_apply.take() {
            return Err(io::Error::new(kind, "injected attribute failure"));
        }
        state.applied.push(*attributes);
        self.read_deadline = attributes.read_deadline();
        Ok(())
    }

    fn set_blocking(&mut self) -> io::Result<()> {
        self.shared.state.lock().blocking = true;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<ReadOutcome> {
        let deadline = self.read_deadline.map(|timeout| Instant::now() + timeout);
        let mut state = self.shared.state.lock();
        loop {
            if state.woken {
                return Ok(ReadOutcome::Woken);
            }
            if !state.read_queue.is_empty() {
                let n = buffer.len().min(state.read_queue.len());
                for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
                    *slot = byte;
                }
                return Ok(ReadOutcome::Data(n));
            }
            match deadline {
                None => self.shared.readable.wait(&mut state),
                Some(deadline) => {
                    if self
                        .shared
                        .readable
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Ok(ReadOutcome::TimedOut);
                    }
                }
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.shared.state.lock().write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.read_queue.clear();
        state.discards += 1;
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        self.shared.state.lock().drains += 1;
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.shared.state.lock().read_queue.len())
    }

    fn waker(&self) -> Arc<dyn DeviceWaker> {
        Arc::new(MockWaker {
            shared: Arc::clone(&self.shared),
        })
    }

    fn close(self) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        state.closes += 1;
        match state.fail_close.take() {
            Some(kind) => Err(io::Error::new(kind, "injected close failure")),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct MockWaker {
    shared: Arc<Shared>,
}

impl DeviceWaker for MockWaker {
    fn wake(&self) {
        self.shared.state.lock().woken = true;
        self.shared.readable.notify_all();
    }
}
