#![cfg(unix)]

use rover_link::transport::{SerialTransport, Transport};
use serialport::TTYPort;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

fn pty_transport() -> (TTYPort, SerialTransport) {
    let (controller, host) = TTYPort::pair().expect("pseudo-terminal pair");
    (controller, SerialTransport::from_port(Box::new(host)))
}

#[test]
fn test_reply_split_across_writes_is_reassembled() {
    let (mut controller, mut transport) = pty_transport();

    controller.write_all(b"15 ").unwrap();
    controller.flush().unwrap();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        controller.write_all(b"0\n").unwrap();
        controller.flush().unwrap();
        controller
    });

    let mut buf = Vec::new();
    assert!(transport.read_line(&mut buf, Duration::from_secs(2)).unwrap());
    assert_eq!(buf, b"15 0\n");
    let _controller = writer.join().unwrap();
}

#[test]
fn test_partial_line_times_out_without_output() {
    let (mut controller, mut transport) = pty_transport();

    controller.write_all(b"15").unwrap();
    controller.flush().unwrap();

    let started = Instant::now();
    let mut buf = Vec::new();
    assert!(!transport.read_line(&mut buf, Duration::from_millis(100)).unwrap());
    assert!(buf.is_empty());
    // One deadline covers the whole line, not each read.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_silent_device_times_out() {
    let (_controller, mut transport) = pty_transport();

    let mut buf = Vec::new();
    assert!(!transport.read_line(&mut buf, Duration::from_millis(50)).unwrap());
    assert!(buf.is_empty());
}

#[test]
fn test_discard_input_drops_buffered_lines() {
    let (mut controller, mut transport) = pty_transport();

    controller.write_all(b"1 2\n3 4\n").unwrap();
    controller.flush().unwrap();

    let mut buf = Vec::new();
    assert!(transport.read_line(&mut buf, Duration::from_secs(1)).unwrap());
    assert_eq!(buf, b"1 2\n");

    // "3 4\n" is now either read ahead into the transport or still in the kernel.
    transport.discard_input().unwrap();
    buf.clear();
    assert!(!transport.read_line(&mut buf, Duration::from_millis(50)).unwrap());
    assert!(buf.is_empty());

    controller.write_all(b"5 6\n").unwrap();
    controller.flush().unwrap();
    assert!(transport.read_line(&mut buf, Duration::from_secs(1)).unwrap());
    assert_eq!(buf, b"5 6\n");
}
