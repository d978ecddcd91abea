//! Serial transport module
//!
//! The board is driven over a full-duplex serial line. Reads and writes go
//! through separate halves so a status read never waits behind a command write.

mod serial;
#[cfg(test)]
pub(crate) mod mock;

pub use self::serial::{SerialReader, SerialTransport, SerialWriter};

use std::time::Duration;
use bytes::Bytes;

use crate::core::Result;

/// Read half of a transport
pub trait TransportReader: Send {
    /// Reads one line without its terminator.
    ///
    /// Returns `Error::Timeout` when no complete line arrived within `timeout`.
    fn read_line(&mut self, timeout: Duration) -> Result<Bytes>;
}

/// Write half of a transport
pub trait TransportWriter: Send {
    /// Writes every byte of `bytes` or fails
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<T: TransportReader + ?Sized> TransportReader for Box<T> {
    fn read_line(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).read_line(timeout)
    }
}

impl<T: TransportWriter + ?Sized> TransportWriter for Box<T> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }
}
