//! UART Console
//!
//! Thin wrapper over any `embedded-io` UART: whole-buffer writes,
//! formatted output through a fixed 256-byte line buffer, and fixed-size
//! receive frames that re-arm after every completed read.
//!
//! Each `Serial` owns its UART, so routing a completed frame back to its
//! port needs no global registry.

use core::fmt::{self, Write as _};

use embedded_io::ReadExactError;
use heapless::String;

use crate::config::SERIAL_BUFFER_SIZE;

/// Serial console error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerialError<E> {
    /// The UART reported an error
    Io(E),
    /// Formatted text or frame does not fit in the buffer
    Overflow,
    /// UART closed before a full frame arrived
    UnexpectedEof,
}

#[cfg(feature = "embedded")]
impl<E> defmt::Format for SerialError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Io(_) => defmt::write!(f, "Io"),
            Self::Overflow => defmt::write!(f, "Overflow"),
            Self::UnexpectedEof => defmt::write!(f, "UnexpectedEof"),
        }
    }
}

impl<E> From<ReadExactError<E>> for SerialError<E> {
    fn from(err: ReadExactError<E>) -> Self {
        match err {
            ReadExactError::UnexpectedEof => Self::UnexpectedEof,
            ReadExactError::Other(e) => Self::Io(e),
        }
    }
}

/// Line-buffered UART console
pub struct Serial<U> {
    uart: U,
    rx: [u8; SERIAL_BUFFER_SIZE],
    rx_size: usize,
    rx_len: usize,
}

impl<U> Serial<U> {
    /// Wrap a UART
    #[must_use]
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            rx: [0; SERIAL_BUFFER_SIZE],
            rx_size: 0,
            rx_len: 0,
        }
    }

    /// Armed frame length
    #[must_use]
    pub const fn receive_size(&self) -> usize {
        self.rx_size
    }

    /// Last completed frame
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.rx[..self.rx_len]
    }

    /// Give the UART back
    pub fn release(self) -> U {
        self.uart
    }

    fn render(args: fmt::Arguments<'_>) -> Option<String<SERIAL_BUFFER_SIZE>> {
        let mut line = String::new();
        match line.write_fmt(args) {
            Ok(()) => Some(line),
            Err(_) => {
                warn!("serial: formatted output exceeds line buffer");
                None
            }
        }
    }
}

impl<U: embedded_io::ErrorType> Serial<U> {
    /// Set the frame length for subsequent receives
    ///
    /// Frames must leave room for a terminator, so at most
    /// `SERIAL_BUFFER_SIZE - 1` bytes.
    pub fn arm_receive(&mut self, size: usize) -> Result<(), SerialError<U::Error>> {
        if size == 0 || size >= SERIAL_BUFFER_SIZE {
            return Err(SerialError::Overflow);
        }
        self.rx_size = size;
        self.rx_len = 0;
        Ok(())
    }
}

impl<U: embedded_io::Write> Serial<U> {
    /// Write raw bytes and wait until they are sent
    pub fn write(&mut self, data: &[u8]) -> Result<(), SerialError<U::Error>> {
        self.uart.write_all(data).map_err(SerialError::Io)?;
        self.uart.flush().map_err(SerialError::Io)
    }

    /// Write a string
    pub fn write_str(&mut self, s: &str) -> Result<(), SerialError<U::Error>> {
        self.write(s.as_bytes())
    }

    /// Format into the line buffer and send it
    ///
    /// Output longer than the buffer is rejected rather than truncated.
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> Result<(), SerialError<U::Error>> {
        let line = Self::render(args).ok_or(SerialError::Overflow)?;
        self.write(line.as_bytes())
    }
}

impl<U: embedded_io::Read> Serial<U> {
    /// Block until the armed number of bytes has arrived
    ///
    /// The receive stays armed with the same size afterwards.
    pub fn receive_frame(&mut self) -> Result<&[u8], SerialError<U::Error>> {
        if self.rx_size == 0 {
            return Err(SerialError::Overflow);
        }
        self.rx_len = 0;
        self.uart.read_exact(&mut self.rx[..self.rx_size])?;
        self.rx_len = self.rx_size;
        trace!("serial: frame of {=usize} bytes", self.rx_len);
        Ok(&self.rx[..self.rx_len])
    }
}

impl<U: embedded_io_async::Write> Serial<U> {
    /// Async version of [`Serial::write`]
    pub async fn write_async(&mut self, data: &[u8]) -> Result<(), SerialError<U::Error>> {
        self.uart.write_all(data).await.map_err(SerialError::Io)?;
        self.uart.flush().await.map_err(SerialError::Io)
    }

    /// Async version of [`Serial::print`]
    pub async fn print_async(&mut self, args: fmt::Arguments<'_>) -> Result<(), SerialError<U::Error>> {
        let line = Self::render(args).ok_or(SerialError::Overflow)?;
        self.write_async(line.as_bytes()).await
    }
}

impl<U: embedded_io_async::Read> Serial<U> {
    /// Async version of [`Serial::receive_frame`]
    pub async fn receive_frame_async(&mut self) -> Result<&[u8], SerialError<U::Error>> {
        if self.rx_size == 0 {
            return Err(SerialError::Overflow);
        }
        self.rx_len = 0;
        self.uart.read_exact(&mut self.rx[..self.rx_size]).await?;
        self.rx_len = self.rx_size;
        Ok(&self.rx[..self.rx_len])
    }
}

impl<U: embedded_io::Write> fmt::Write for Serial<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Serial::write_str(self, s).map_err(|_| fmt::Error)
    }
}
