//! Serial Console Tests
//!
//! Tests for the UART console wrapper: writes, formatted output, and
//! fixed-size receive frames
//! Run with: cargo test --test serial_tests

mod common;

use std::fmt::Write as _;

use common::FakeUart;
use embassy_futures::block_on;
use instrument_firmware::config::SERIAL_BUFFER_SIZE;
use instrument_firmware::hal::serial::{Serial, SerialError};

// =============================================================================
// Transmit Tests
// =============================================================================

#[test]
fn test_write_sends_and_flushes() {
    let mut serial = Serial::new(FakeUart::default());
    serial.write(b"hello").unwrap();
    serial.write_str(" world").unwrap();

    let uart = serial.release();
    assert_eq!(uart.tx, b"hello world");
    assert_eq!(uart.flushes, 2);
}

#[test]
fn test_print_formats() {
    let mut serial = Serial::new(FakeUart::default());
    serial.print(format_args!("source {} Hz\r\n", 1_000)).unwrap();
    assert_eq!(serial.release().tx, b"source 1000 Hz\r\n");
}

#[test]
fn test_print_overflow_rejected() {
    let mut serial = Serial::new(FakeUart::default());
    let long = "x".repeat(SERIAL_BUFFER_SIZE + 1);
    assert_eq!(
        serial.print(format_args!("{long}")),
        Err(SerialError::Overflow)
    );
    assert!(serial.release().tx.is_empty());
}

#[test]
fn test_print_fits_exactly() {
    let mut serial = Serial::new(FakeUart::default());
    let line = "y".repeat(SERIAL_BUFFER_SIZE);
    serial.print(format_args!("{line}")).unwrap();
    assert_eq!(serial.release().tx.len(), SERIAL_BUFFER_SIZE);
}

#[test]
fn test_fmt_write() {
    let mut serial = Serial::new(FakeUart::default());
    write!(serial, "{}-{}", 4, 2).unwrap();
    assert_eq!(serial.release().tx, b"4-2");
}

// =============================================================================
// Receive Tests
// =============================================================================

#[test]
fn test_arm_receive_limits() {
    let mut serial = Serial::new(FakeUart::default());
    assert_eq!(serial.arm_receive(0), Err(SerialError::Overflow));
    assert_eq!(serial.arm_receive(SERIAL_BUFFER_SIZE), Err(SerialError::Overflow));
    serial.arm_receive(SERIAL_BUFFER_SIZE - 1).unwrap();
    assert_eq!(serial.receive_size(), SERIAL_BUFFER_SIZE - 1);
}

#[test]
fn test_receive_needs_arming() {
    let mut serial = Serial::new(FakeUart::with_input(b"abc"));
    assert_eq!(serial.receive_frame(), Err(SerialError::Overflow));
}

#[test]
fn test_receive_frames_rearm() {
    let mut serial = Serial::new(FakeUart::with_input(b"abcdef"));
    serial.arm_receive(3).unwrap();

    assert_eq!(serial.receive_frame().unwrap(), b"abc");
    assert_eq!(serial.buffer(), b"abc");
    assert_eq!(serial.receive_frame().unwrap(), b"def");
    assert_eq!(serial.receive_size(), 3);
}

#[test]
fn test_receive_short_input() {
    let mut serial = Serial::new(FakeUart::with_input(b"ab"));
    serial.arm_receive(3).unwrap();
    assert_eq!(serial.receive_frame(), Err(SerialError::UnexpectedEof));
    assert!(serial.buffer().is_empty());
}

#[test]
fn test_rearm_clears_last_frame() {
    let mut serial = Serial::new(FakeUart::with_input(b"abcd"));
    serial.arm_receive(2).unwrap();
    serial.receive_frame().unwrap();
    serial.arm_receive(2).unwrap();
    assert!(serial.buffer().is_empty());
}

// =============================================================================
// Async Tests
// =============================================================================

#[test]
fn test_async_write_and_print() {
    let mut serial = Serial::new(FakeUart::default());
    block_on(serial.write_async(b"ok ")).unwrap();
    block_on(serial.print_async(format_args!("{}", 7))).unwrap();

    let uart = serial.release();
    assert_eq!(uart.tx, b"ok 7");
    assert_eq!(uart.flushes, 2);
}

#[test]
fn test_async_receive_frame() {
    let mut serial = Serial::new(FakeUart::with_input(b"+-"));
    serial.arm_receive(1).unwrap();
    assert_eq!(block_on(serial.receive_frame_async()).unwrap(), b"+");
    assert_eq!(block_on(serial.receive_frame_async()).unwrap(), b"-");
    assert_eq!(
        block_on(serial.receive_frame_async()),
        Err(SerialError::UnexpectedEof)
    );
}
