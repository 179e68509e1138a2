//! Shared test utilities for serial-line integration tests.
//!
//! - pseudo-terminal pairs, so a real terminal driver sits behind the port
//! - a socat-backed virtual null-modem link
//! - helpers for reading until a byte count or deadline

#![allow(dead_code)]

use serial_line::port::{PortConfiguration, PortError, SerialPort};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Master side of a pseudo-terminal plus the path of its slave device.
#[derive(Debug)]
pub struct PtyPair {
    pub master: File,
    pub slave_path: String,
}

/// Allocate a pseudo-terminal. The slave is left unopened.
#[cfg(target_os = "linux")]
pub fn open_pty() -> io::Result<PtyPair> {
    use std::ffi::CStr;
    use std::os::fd::FromRawFd;

    // SAFETY: plain libc calls on a descriptor owned by `master` from the
    // moment it is created.
    unsafe {
        let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let master = File::from_raw_fd(fd);
        if libc::grantpt(fd) != 0 || libc::unlockpt(fd) != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut name = [0 as libc::c_char; 128];
        let rc = libc::ptsname_r(fd, name.as_mut_ptr(), name.len());
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        let slave_path = CStr::from_ptr(name.as_ptr()).to_string_lossy().into_owned();
        Ok(PtyPair { master, slave_path })
    }
}

/// Read from `file` until `count` bytes arrived or `timeout` passed.
pub fn read_exact_within(file: &mut File, count: usize, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut collected = Vec::with_capacity(count);
    let mut buffer = [0u8; 256];

    while collected.len() < count {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let remaining = (deadline - now).as_millis().min(i32::MAX as u128) as libc::c_int;
        let mut pollfd = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd for the duration of the call.
        let ready = unsafe { libc::poll(&mut pollfd, 1, remaining.max(1)) };
        if ready <= 0 {
            continue;
        }
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(&buffer[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    collected
}

/// Read from a port until `count` bytes arrived, a timeout read, or the end
/// of the stream.
pub fn read_port(port: &mut SerialPort, count: usize) -> Result<Vec<u8>, PortError> {
    let mut collected = Vec::with_capacity(count);
    let mut buffer = [0u8; 256];
    while collected.len() < count {
        let want = (count - collected.len()).min(buffer.len());
        match port.read(&mut buffer[..want])? {
            0 => break,
            n => collected.extend_from_slice(&buffer[..n]),
        }
    }
    Ok(collected)
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// 115200 8N1 with the given read timeout.
pub fn line_config(path: &str, read_timeout: Duration) -> PortConfiguration {
    PortConfiguration::new(path, 115_200).read_timeout(read_timeout)
}

/// Whether `binary` can be started.
pub fn socat_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Two linked pseudo-terminals created by socat. The process is killed on drop.
#[derive(Debug)]
pub struct SocatLink {
    child: Child,
    pub end_a: PathBuf,
    pub end_b: PathBuf,
}

impl SocatLink {
    /// Start socat and wait for both link files to appear in `dir`.
    pub fn start(binary: &str, dir: &Path) -> io::Result<Self> {
        let end_a = dir.join("end-a");
        let end_b = dir.join("end-b");
        let child = Command::new(binary)
            .arg(format!("pty,raw,echo=0,link={}", end_a.display()))
            .arg(format!("pty,raw,echo=0,link={}", end_b.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let link = Self {
            child,
            end_a,
            end_b,
        };

        if !wait_until(Duration::from_secs(5), || {
            link.end_a.exists() && link.end_b.exists()
        }) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "socat did not create its links",
            ));
        }
        Ok(link)
    }

    pub fn path_a(&self) -> String {
        self.end_a.to_string_lossy().into_owned()
    }

    pub fn path_b(&self) -> String {
        self.end_b.to_string_lossy().into_owned()
    }
}

impl Drop for SocatLink {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
