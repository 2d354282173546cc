use crate::protocol::LINE_TERMINATOR;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

const READ_CHUNK_SIZE: usize = 64;

/// Byte transport carrying one request/reply exchange at a time.
pub trait Transport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Append the next line, terminator included, to `buf`.
    ///
    /// Returns `Ok(false)` if no complete line arrived within `timeout`; any
    /// partial line read so far is left out of `buf`.
    fn read_line(&mut self, buf: &mut Vec<u8>, timeout: Duration) -> io::Result<bool>;

    /// Drop everything received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;

    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, timeout: Duration) -> io::Result<bool> {
        (**self).read_line(buf, timeout)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// UART transport, 8-N-1 without flow control.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        Ok(Self::from_port(port))
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(READ_CHUNK_SIZE),
        }
    }

    fn take_line(&mut self, buf: &mut Vec<u8>) -> bool {
        match self.pending.iter().position(|b| *b == LINE_TERMINATOR) {
            Some(end) => {
                buf.extend(self.pending.drain(..=end));
                true
            }
            None => false,
        }
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if self.take_line(buf) {
                return Ok(true);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            self.port.set_timeout(remaining)?;

            match self.port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let stale = self.pending.len() + self.port.bytes_to_read().unwrap_or(0) as usize;
        if stale > 0 {
            debug!(bytes = stale, "discarding stale input");
        }
        self.pending.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
