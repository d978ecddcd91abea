use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::{Channel, Error, Level, Result, QUERY_MARKER, SET_FRAME_LEN, SET_MARKER};

/// Binary command understood by the relay board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFrame {
    /// `[0xA0, channel+1, level, checksum]`
    Set {
        /// Target relay
        channel: Channel,
        /// Requested level
        level: Level,
    },
    /// Single `0xFF` status request
    Query,
}

impl CommandFrame {
    /// Computes the set-frame checksum: low byte of marker + channel number + level
    pub fn checksum(channel: Channel, level: Level) -> u8 {
        SET_MARKER
            .wrapping_add(channel.wire_number())
            .wrapping_add(level.as_byte())
    }

    /// Number of bytes this frame occupies on the wire
    pub fn len(&self) -> usize {
        match self {
            CommandFrame::Set { .. } => SET_FRAME_LEN,
            CommandFrame::Query => 1,
        }
    }

    /// Appends the wire bytes to `dst`
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.len());
        match *self {
            CommandFrame::Set { channel, level } => {
                dst.put_u8(SET_MARKER);
                dst.put_u8(channel.wire_number());
                dst.put_u8(level.as_byte());
                dst.put_u8(Self::checksum(channel, level));
            }
            CommandFrame::Query => dst.put_u8(QUERY_MARKER),
        }
    }

    /// Returns the wire bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Parses a complete frame, refusing anything that is not bit-exact
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [QUERY_MARKER] => Ok(CommandFrame::Query),
            [marker, number, level, checksum] => {
                if *marker != SET_MARKER {
                    return Err(Error::malformed_frame(format!("unexpected marker {:#04x}", marker)));
                }
                let channel = Channel::from_number(*number)
                    .ok_or_else(|| Error::malformed_frame("channel number 0"))?;
                let level = Level::from_byte(*level)
                    .ok_or_else(|| Error::malformed_frame(format!("level byte {:#04x}", level)))?;
                let expected = Self::checksum(channel, level);
                if *checksum != expected {
                    return Err(Error::malformed_frame(format!(
                        "checksum {:#04x}, expected {:#04x}",
                        checksum, expected
                    )));
                }
                Ok(CommandFrame::Set { channel, level })
            }
            _ => Err(Error::malformed_frame(format!("{} bytes", bytes.len()))),
        }
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// A channel report decoded from a `CHx: ON|OFF` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    /// Reported slot, `None` when the marker names a slot the board does not have
    pub channel: Option<Channel>,
    /// Reported level
    pub level: Level,
}

/// Result of decoding one line from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A channel status report
    Status(StatusEvent),
    /// Anything else the board printed (banners, echoes)
    Raw(String),
    /// Nothing but whitespace
    Empty,
}
