use std::io;
use thiserror::Error;

/// Custom error types for the relay controller
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid channel {channel}: board addresses channels 0..{limit}")]
    InvalidChannel {
        /// Requested channel (0-indexed)
        channel: u8,
        /// Number of addressable channels
        limit: u8,
    },

    #[error("Transport closed")]
    TransportClosed,

    #[error("Transport timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unrecognized status line: {0}")]
    DecodeMismatch(String),

    #[error("Playlist error on line {line}: {reason}")]
    Playlist {
        /// 1-based line number in the source
        line: usize,
        /// What was wrong with the record
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new invalid channel error
    pub fn invalid_channel(channel: u8, limit: u8) -> Self {
        Error::InvalidChannel { channel, limit }
    }

    /// Creates a new malformed frame error
    pub fn malformed_frame(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Creates a new decode mismatch error
    pub fn decode_mismatch(msg: impl Into<String>) -> Self {
        Error::DecodeMismatch(msg.into())
    }

    /// Creates a new playlist error
    pub fn playlist(line: usize, reason: impl Into<String>) -> Self {
        Error::Playlist {
            line,
            reason: reason.into(),
        }
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Returns true for a read that simply produced nothing in time
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
            _ => false,
        }
    }

    /// Returns true when the transport can no longer serve any request
    pub fn is_transport_lost(&self) -> bool {
        match self {
            Error::TransportClosed => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionAborted
            ),
            Error::Serial(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::invalid_channel(7, 4);
        assert!(matches!(err, Error::InvalidChannel { channel: 7, limit: 4 }));
        assert_eq!(err.to_string(), "Invalid channel 7: board addresses channels 0..4");

        let err = Error::playlist(3, "missing duration");
        assert_eq!(err.to_string(), "Playlist error on line 3: missing duration");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Timeout.is_timeout());
        assert!(Error::from(io::Error::from(io::ErrorKind::TimedOut)).is_timeout());
        assert!(!Error::TransportClosed.is_timeout());

        assert!(Error::TransportClosed.is_transport_lost());
        assert!(Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_transport_lost());
        assert!(!Error::Timeout.is_transport_lost());
        assert!(!Error::invalid_channel(9, 4).is_transport_lost());
    }
}
