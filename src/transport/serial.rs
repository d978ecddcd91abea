use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serialport::SerialPort;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::core::{Error, Result};
use crate::protocol::LineCodec;
use super::{TransportReader, TransportWriter};

/// Opens serial relay boards
pub struct SerialTransport;

impl SerialTransport {
    /// Opens `device_path` and splits it into independent read and write halves
    pub fn open(device_path: &str, baud_rate: u32, timeout: Duration) -> Result<(SerialReader, SerialWriter)> {
        let port = serialport::new(device_path, baud_rate)
            .timeout(timeout)
            .open()?;
        let read_port = port.try_clone()?;

        debug!(device = device_path, baud_rate, "serial port opened");

        Ok((
            SerialReader {
                port: read_port,
                timeout,
                buffer: BytesMut::with_capacity(crate::protocol::MAX_LINE_LENGTH),
                lines: LineCodec::new(),
            },
            SerialWriter { port },
        ))
    }
}

/// Read half of a serial port, buffering partial lines between calls
pub struct SerialReader {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    buffer: BytesMut,
    lines: LineCodec,
}

impl TransportReader for SerialReader {
    fn read_line(&mut self, timeout: Duration) -> Result<Bytes> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];
        loop {
            if let Some(line) = self.lines.decode(&mut self.buffer)? {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => return Err(Error::TransportClosed),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(Error::Timeout),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Write half of a serial port
pub struct SerialWriter {
    port: Box<dyn SerialPort>,
}

impl TransportWriter for SerialWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let result = SerialTransport::open("/dev/does-not-exist-relay", 9600, Duration::from_millis(10));
        assert!(matches!(result, Err(Error::Serial(_)) | Err(Error::Io(_))));
    }

    #[test]
    #[ignore] // Requires relay hardware
    fn test_status_query_roundtrip() {
        let (mut reader, mut writer) =
            SerialTransport::open("/dev/ttyUSB0", 9600, Duration::from_millis(100)).unwrap();
        writer.write_bytes(&[0xFF]).unwrap();
        let line = reader.read_line(Duration::from_millis(500)).unwrap();
        assert!(line.starts_with(b"CH"));
    }
}
