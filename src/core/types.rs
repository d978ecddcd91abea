use std::fmt;
use std::time::Duration;

use serde::{Serialize, Deserialize};

/// A relay output, 0-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Channel(pub u8);

impl Channel {
    /// Creates a channel from a 0-based index
    pub fn new(index: u8) -> Self {
        Channel(index)
    }

    /// Creates a channel from the 1-based number printed on the board
    pub fn from_number(number: u8) -> Option<Self> {
        number.checked_sub(1).map(Channel)
    }

    /// Returns the 0-based index
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Returns the 1-based number printed on the board
    pub fn number(&self) -> u16 {
        u16::from(self.0) + 1
    }

    /// Returns the channel byte of a set frame.
    ///
    /// Index 255 has no wire number and wraps to 0, which the board rejects.
    pub fn wire_number(&self) -> u8 {
        self.0.wrapping_add(1)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.number())
    }
}

/// Binary relay level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Level {
    /// Relay open
    #[default]
    Off = 0,
    /// Relay closed
    On = 1,
}

impl Level {
    /// Returns the byte the device uses for this level
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Parses a level byte, rejecting anything other than 0 or 1
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Level::Off),
            1 => Some(Level::On),
            _ => None,
        }
    }

    /// Returns whether the relay is closed
    pub fn is_on(&self) -> bool {
        matches!(self, Level::On)
    }
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on { Level::On } else { Level::Off }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Off => f.write_str("OFF"),
            Level::On => f.write_str("ON"),
        }
    }
}

/// How each playlist entry drives its relay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PulsePolicy {
    /// Switch ON and hold for the requested duration
    Direct,
    /// Switch OFF, wait `settle`, switch ON, then hold
    ResetPulse {
        /// Delay between the OFF and ON writes
        #[serde(serialize_with = "super::serde::serialize_duration")]
        #[serde(deserialize_with = "super::serde::deserialize_duration")]
        settle: Duration,
    },
}

impl Default for PulsePolicy {
    fn default() -> Self {
        PulsePolicy::Direct
    }
}

/// Configuration for command sequencing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Shortest hold after any write; the board takes one command at a time
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub min_hold: Duration,
    /// Per-entry pulse pattern
    pub pulse: PulsePolicy,
    /// Switch the last played channel OFF once the sequence ends
    pub release_on_finish: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            min_hold: Duration::from_millis(100),
            pulse: PulsePolicy::Direct,
            release_on_finish: false,
        }
    }
}

/// Configuration for a relay controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub device: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Read timeout; bounds listener shutdown latency
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub read_timeout: Duration,
    /// Addressable relay outputs
    pub relay_count: u8,
    /// Status slots the listener accepts
    pub status_slots: u8,
    /// Time given to the listener to absorb a status reply
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub status_wait: Duration,
    /// Sequencer settings
    pub sequencer: SequencerConfig,
}

impl ControllerConfig {
    /// Creates a default configuration for the given device
    pub fn for_device(device: impl Into<String>) -> Self {
        ControllerConfig {
            device: device.into(),
            ..Default::default()
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            device: String::from("/dev/ttyUSB0"),
            baud_rate: super::DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            relay_count: super::RELAY_COUNT,
            status_slots: super::STATUS_SLOTS,
            status_wait: Duration::from_millis(150),
            sequencer: SequencerConfig::default(),
        }
    }
}
