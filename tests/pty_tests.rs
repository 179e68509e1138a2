//! Port lifecycle against a real terminal driver, using a pseudo-terminal
//! slave as the device and the master as the far end of the line.

#![cfg(target_os = "linux")]

mod common;

use common::{line_config, open_pty, read_exact_within, read_port, wait_until};
use pretty_assertions::assert_eq;
use serial_line::port::{Parity, PortConfiguration, PortError, PortState, SerialPort, StopBits};
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const LINK_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn test_round_trip_with_split_writes() {
    let mut pty = open_pty().unwrap();
    let mut port = SerialPort::open(line_config(&pty.slave_path, Duration::from_secs(1))).unwrap();
    assert_eq!(port.state(), PortState::Ready);

    assert_eq!(port.write(b"Hello, ").unwrap(), 7);
    assert_eq!(port.write(b"world!").unwrap(), 6);
    port.drain().unwrap();
    assert_eq!(
        read_exact_within(&mut pty.master, 13, LINK_TIMEOUT),
        b"Hello, world!"
    );

    pty.master.write_all(b"And back ").unwrap();
    pty.master.write_all(b"again").unwrap();
    assert_eq!(read_port(&mut port, 14).unwrap(), b"And back again");

    port.close().unwrap();
    assert_eq!(port.state(), PortState::Closed);
}

#[test]
fn test_every_supported_line_shape_applies() {
    let pty = open_pty().unwrap();
    for data_bits in 5..=8 {
        for parity in [Parity::None, Parity::Odd, Parity::Even] {
            for stop_bits in [StopBits::One, StopBits::Two] {
                let config = PortConfiguration::new(pty.slave_path.as_str(), 9600)
                    .data_bits(data_bits)
                    .parity(parity)
                    .stop_bits(stop_bits)
                    .read_timeout(Duration::from_millis(100));
                let mut port = SerialPort::open(config).unwrap();
                port.close().unwrap();
            }
        }
    }
}

#[test]
fn test_read_times_out_with_zero_bytes() {
    let pty = open_pty().unwrap();
    let mut port =
        SerialPort::open(line_config(&pty.slave_path, Duration::from_millis(200))).unwrap();

    let mut buffer = [0u8; 16];
    let started = Instant::now();
    assert_eq!(port.read(&mut buffer).unwrap(), 0);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(port.is_open());
}

#[test]
fn test_flush_discards_pending_input() {
    let mut pty = open_pty().unwrap();
    let mut port =
        SerialPort::open(line_config(&pty.slave_path, Duration::from_millis(200))).unwrap();

    pty.master.write_all(b"stale").unwrap();
    assert!(wait_until(LINK_TIMEOUT, || port.bytes_to_read() == Some(5)));

    port.flush().unwrap();
    assert_eq!(port.bytes_to_read(), Some(0));

    pty.master.write_all(b"fresh").unwrap();
    assert_eq!(read_port(&mut port, 5).unwrap(), b"fresh");
}

#[test]
fn test_close_handle_unblocks_blocking_read() {
    let pty = open_pty().unwrap();
    let mut port = SerialPort::open(line_config(&pty.slave_path, Duration::ZERO)).unwrap();
    let close = port.close_handle();

    let (tx, rx) = mpsc::sync_channel(1);
    let reader = thread::spawn(move || {
        let mut buffer = [0u8; 16];
        let result = port.read(&mut buffer);
        let _ = tx.send(result.map_err(|err| err.is_end_of_stream()));
        port
    });

    thread::sleep(Duration::from_millis(100));
    assert!(rx.try_recv().is_err(), "read returned before close");
    close.close();

    let result = rx.recv_timeout(LINK_TIMEOUT).unwrap();
    assert_eq!(result, Err(true));

    let mut port = reader.join().unwrap();
    assert_eq!(port.state(), PortState::Closed);
    assert!(matches!(port.write(b"x"), Err(PortError::Closed)));
}

#[test]
fn test_peer_hangup_ends_stream() {
    let pty = open_pty().unwrap();
    let mut port = SerialPort::open(line_config(&pty.slave_path, Duration::ZERO)).unwrap();

    drop(pty.master);

    let mut buffer = [0u8; 16];
    assert!(matches!(
        port.read(&mut buffer),
        Err(PortError::EndOfStream)
    ));
}

#[test]
fn test_set_speed_keeps_the_line_usable() {
    let mut pty = open_pty().unwrap();
    let mut port = SerialPort::open(line_config(&pty.slave_path, Duration::from_secs(1))).unwrap();

    port.set_speed(9600).unwrap();
    assert_eq!(port.config().baud_rate, 9600);

    assert!(matches!(
        port.set_speed(12_345),
        Err(PortError::InvalidConfig(_))
    ));
    assert_eq!(port.config().baud_rate, 9600);

    port.write(b"ping").unwrap();
    assert_eq!(read_exact_within(&mut pty.master, 4, LINK_TIMEOUT), b"ping");
}

#[test]
fn test_io_traits_copy_through_the_line() {
    let mut pty = open_pty().unwrap();
    let mut port = SerialPort::open(line_config(&pty.slave_path, Duration::from_secs(1))).unwrap();

    io::Write::write_all(&mut port, b"via io::Write").unwrap();
    io::Write::flush(&mut port).unwrap();
    assert_eq!(
        read_exact_within(&mut pty.master, 13, LINK_TIMEOUT),
        b"via io::Write"
    );
}

#[test]
fn test_missing_device_fails_to_open() {
    let err = SerialPort::open(line_config("/dev/serial-line-missing", Duration::ZERO)).unwrap_err();
    match err {
        PortError::Open { path, source } => {
            assert_eq!(path, "/dev/serial-line-missing");
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("expected Open error, got {other:?}"),
    }
}

#[test]
fn test_non_terminal_fails_attribute_apply() {
    let err = SerialPort::open(line_config("/dev/null", Duration::ZERO)).unwrap_err();
    assert!(matches!(err, PortError::AttributeApply { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
}

#[test]
fn test_invalid_configuration_is_rejected_before_open() {
    let config = line_config("/dev/serial-line-missing", Duration::ZERO).data_bits(9);
    assert!(matches!(
        SerialPort::open(config),
        Err(PortError::InvalidConfig(_))
    ));
}
