//! Line transport to the generator
//!
//! [`Transport`] is the seam between the register protocol and the actual
//! serial port, so the protocol can be tested against a mock.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::trace;

use crate::error::{ControllerError, Result};

/// Default JDS6600 baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Longest response line accepted before giving up
const MAX_LINE_LEN: usize = 256;

/// Sends request lines and receives response lines
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Write one request line (including its terminator)
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one response line without the terminator
    fn read_line(&mut self) -> Result<String>;
}

/// [`Transport`] over a real serial port (8N1, no flow control)
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `name` at `baud_rate` with a per-read `timeout`
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| ControllerError::Serial {
                port: name.to_string(),
                error: e.to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            port,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn error(&self, error: impl ToString) -> ControllerError {
        ControllerError::Serial {
            port: self.name.clone(),
            error: error.to_string(),
        }
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> Result<()> {
        trace!(port = %self.name, request = line.trim_end(), "serial write");
        // Drop stale bytes so the next read pairs with this request
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| self.error(e))?;
        self.port
            .write_all(line.as_bytes())
            .map_err(|e| self.error(e))?;
        self.port.flush().map_err(|e| self.error(e))
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::with_capacity(32);
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(self.error("port closed")),
                Ok(_) => match byte[0] {
                    b'\n' => break,
                    b'\r' => {}
                    b => buf.push(b),
                },
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(self.error("timed out waiting for response"));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.error(e)),
            }
            if buf.len() > MAX_LINE_LEN {
                return Err(ControllerError::Protocol(format!(
                    "response from {} exceeds {} bytes",
                    self.name, MAX_LINE_LEN
                )));
            }
        }
        let line = String::from_utf8_lossy(&buf).trim().to_string();
        trace!(port = %self.name, response = %line, "serial read");
        Ok(line)
    }
}
