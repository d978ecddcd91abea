use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Channel, ControllerConfig, Error, Level, Result};
use super::frame::{CommandFrame, Decoded, StatusEvent};

/// Longest line the board is expected to print
pub const MAX_LINE_LENGTH: usize = 256;

/// Relay protocol codec: set/query encoding and status line decoding
#[derive(Debug, Clone, Copy)]
pub struct RelayCodec {
    relay_count: u8,
    status_slots: u8,
}

impl RelayCodec {
    /// Creates a codec for a board with the given geometry
    pub fn new(relay_count: u8, status_slots: u8) -> Self {
        RelayCodec {
            relay_count,
            status_slots: status_slots.max(relay_count),
        }
    }

    /// Creates a codec from controller configuration
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.relay_count, config.status_slots)
    }

    /// Addressable relay outputs
    pub fn relay_count(&self) -> u8 {
        self.relay_count
    }

    /// Status slots the board reports on
    pub fn status_slots(&self) -> u8 {
        self.status_slots
    }

    /// Encodes a set command, rejecting channels the board cannot address
    pub fn encode_set(&self, channel: Channel, level: Level) -> Result<CommandFrame> {
        if channel.index() >= self.relay_count {
            return Err(Error::invalid_channel(channel.index(), self.relay_count));
        }
        Ok(CommandFrame::Set { channel, level })
    }

    /// Encodes the status request
    pub fn encode_query(&self) -> CommandFrame {
        CommandFrame::Query
    }

    /// Decodes one line from the device. Never fails; anything that is not a
    /// status report comes back as raw text.
    pub fn decode_line(&self, raw: &[u8]) -> Decoded {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() {
            return Decoded::Empty;
        }

        match parse_status_line(text) {
            Ok((number, level)) => {
                let channel = u8::try_from(number)
                    .ok()
                    .and_then(Channel::from_number)
                    .filter(|channel| channel.index() < self.status_slots);
                Decoded::Status(StatusEvent { channel, level })
            }
            Err(_) => Decoded::Raw(text.to_string()),
        }
    }
}

impl Default for RelayCodec {
    fn default() -> Self {
        Self::new(crate::core::RELAY_COUNT, crate::core::STATUS_SLOTS)
    }
}

/// Parses `CHn: ON|OFF` into the 1-based slot number and level.
///
/// Slot numbers too large for a `u16` saturate to `u16::MAX`.
pub fn parse_status_line(text: &str) -> Result<(u16, Level)> {
    let mut tokens = text.split_whitespace();
    let (marker, state) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(marker), Some(state), None) => (marker, state),
        _ => return Err(Error::decode_mismatch(text)),
    };

    let number = marker
        .strip_prefix("CH")
        .and_then(|rest| rest.strip_suffix(':'))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .map(|digits| digits.parse::<u16>().unwrap_or(u16::MAX))
        .ok_or_else(|| Error::decode_mismatch(text))?;

    let level = match state {
        "ON" => Level::On,
        "OFF" => Level::Off,
        _ => return Err(Error::decode_mismatch(text)),
    };

    Ok((number, level))
}

impl Encoder<CommandFrame> for RelayCodec {
    type Error = Error;

    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<()> {
        if let CommandFrame::Set { channel, .. } = item {
            if channel.index() >= self.relay_count {
                return Err(Error::invalid_channel(channel.index(), self.relay_count));
            }
        }
        item.write_to(dst);
        Ok(())
    }
}

/// Splits the serial byte stream into newline-terminated lines
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    next_index: usize,
}

impl LineCodec {
    /// Creates a line codec with the default maximum line length
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Creates a line codec that flushes lines longer than `max_length`
    pub fn with_max_length(max_length: usize) -> Self {
        LineCodec {
            max_length: max_length.max(1),
            next_index: 0,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Resume the newline scan where the previous call stopped
        let start = self.next_index.min(src.len());
        if let Some(offset) = src[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            self.next_index = 0;
            let mut line = src.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            return Ok(Some(line.freeze()));
        }

        if src.len() >= self.max_length {
            // No terminator in sight; hand the garbage over as one line
            self.next_index = 0;
            let line = src.split_to(self.max_length);
            return Ok(Some(line.freeze()));
        }

        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                self.next_index = 0;
                let line = src.split_to(src.len()).freeze();
                Ok(Some(line))
            }
        }
    }
}
