//! Unix terminal device backend.
//!
//! Opens the tty with `O_NOCTTY | O_NONBLOCK`, programs it with `tcsetattr`,
//! and reads through `poll(2)` on the device plus a wake pipe so another
//! thread can interrupt a blocked read by requesting a close.

use super::attributes::TerminalAttributes;
use super::traits::{Backend, DeviceWaker, ReadOutcome, SerialDevice};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Turn a libc `-1` return into the current `errno`.
fn cvt(result: libc::c_int) -> io::Result<libc::c_int> {
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

/// Retry a call interrupted by a signal.
fn cvt_retry(mut call: impl FnMut() -> libc::c_int) -> io::Result<libc::c_int> {
    loop {
        match cvt(call()) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn set_fd_flags(fd: RawFd, set: libc::c_int, clear: libc::c_int) -> io::Result<()> {
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    let updated = (flags | set) & !clear;
    if updated != flags {
        cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, updated) })?;
    }
    Ok(())
}

/// Build the host `termios` layout from derived attributes.
fn to_termios(attributes: &TerminalAttributes) -> io::Result<libc::termios> {
    // All-zero is a valid termios: no output processing, no local modes.
    let mut termios: libc::termios = unsafe { mem::zeroed() };
    termios.c_iflag = attributes.input_flags();
    termios.c_cflag = attributes.control_flags();
    termios.c_cc = attributes.control_chars();
    cvt(unsafe { libc::cfsetispeed(&mut termios, attributes.speed()) })?;
    cvt(unsafe { libc::cfsetospeed(&mut termios, attributes.speed()) })?;
    Ok(termios)
}

/// Opens tty devices through the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixBackend;

impl Backend for UnixBackend {
    type Device = UnixDevice;

    fn open(&self, path: &str) -> io::Result<UnixDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)?;
        let waker = Arc::new(PipeWaker::new()?);
        Ok(UnixDevice {
            file,
            read_deadline: None,
            waker,
        })
    }
}

/// Self-pipe used to interrupt `poll`.
///
/// Both ends live here so a late `wake` never writes into a pipe with no
/// reader. Once written the pipe stays readable, so every later poll sees it.
#[derive(Debug)]
pub struct PipeWaker {
    read: OwnedFd,
    write: OwnedFd,
}

impl PipeWaker {
    fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        cvt(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [read.as_raw_fd(), write.as_raw_fd()] {
            cvt(unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) })?;
            set_fd_flags(fd, libc::O_NONBLOCK, 0)?;
        }
        Ok(Self { read, write })
    }
}

impl DeviceWaker for PipeWaker {
    fn wake(&self) {
        let byte = 1u8;
        // A full pipe is already readable.
        let _ = unsafe {
            libc::write(
                self.write.as_raw_fd(),
                &byte as *const u8 as *const libc::c_void,
                1,
            )
        };
    }
}

/// An open tty.
#[derive(Debug)]
pub struct UnixDevice {
    file: File,
    read_deadline: Option<Duration>,
    waker: Arc<PipeWaker>,
}

impl UnixDevice {
    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Wait for the device or the wake pipe. Returns device `revents`, or
    /// `None` when woken.
    fn wait_readable(&self) -> io::Result<Option<libc::c_short>> {
        let deadline = self.read_deadline.map(|timeout| Instant::now() + timeout);
        let mut fds = [
            libc::pollfd {
                fd: self.fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.waker.read.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        loop {
            let timeout_ms = match deadline {
                None => -1,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    // Round up so a sub-millisecond remainder still waits.
                    remaining.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128)
                        as libc::c_int
                }
            };
            fds[0].revents = 0;
            fds[1].revents = 0;
            match cvt(unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) }) {
                Ok(_) if fds[1].revents != 0 => return Ok(None),
                Ok(0) => return Ok(Some(0)),
                Ok(_) => return Ok(Some(fds[0].revents)),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl SerialDevice for UnixDevice {
    fn apply_attributes(&mut self, attributes: &TerminalAttributes) -> io::Result<()> {
        let termios = to_termios(attributes)?;
        cvt(unsafe { libc::tcsetattr(self.fd(), libc::TCSANOW, &termios) })?;
        self.read_deadline = attributes.read_deadline();
        trace!(
            fd = self.fd(),
            vmin = attributes.min_bytes(),
            vtime = attributes.timeout_deciseconds(),
            "tcsetattr applied"
        );
        Ok(())
    }

    fn set_blocking(&mut self) -> io::Result<()> {
        set_fd_flags(self.fd(), 0, libc::O_NONBLOCK)
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<ReadOutcome> {
        let revents = match self.wait_readable()? {
            None => return Ok(ReadOutcome::Woken),
            Some(0) => return Ok(ReadOutcome::TimedOut),
            Some(revents) => revents,
        };
        if revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        let hung_up = revents & (libc::POLLHUP | libc::POLLERR) != 0;
        if revents & libc::POLLIN == 0 {
            return Ok(if hung_up {
                ReadOutcome::Hangup
            } else {
                ReadOutcome::TimedOut
            });
        }

        loop {
            match self.file.read(buffer) {
                Ok(0) if hung_up => return Ok(ReadOutcome::Hangup),
                Ok(0) => return Ok(ReadOutcome::TimedOut),
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                // Linux reports a vanished pty master as EIO.
                Err(err) if hung_up && err.raw_os_error() == Some(libc::EIO) => {
                    return Ok(ReadOutcome::Hangup)
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        loop {
            match self.file.write(data) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        cvt(unsafe { libc::tcflush(self.fd(), libc::TCIOFLUSH) }).map(drop)
    }

    fn drain(&mut self) -> io::Result<()> {
        let fd = self.fd();
        cvt_retry(|| unsafe { libc::tcdrain(fd) }).map(drop)
    }

    fn bytes_to_read(&self) -> Option<usize> {
        let mut available: libc::c_int = 0;
        let result = unsafe { libc::ioctl(self.fd(), libc::FIONREAD, &mut available as *mut libc::c_int) };
        if result == -1 {
            None
        } else {
            usize::try_from(available).ok()
        }
    }

    fn waker(&self) -> Arc<dyn DeviceWaker> {
        self.waker.clone()
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // POSIX leaves the descriptor state unspecified after EINTR; never retry.
        cvt(unsafe { libc::close(fd) }).map(drop)
    }
}
