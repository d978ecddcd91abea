//! Core types and traits for the relay controller
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    Channel,
    ControllerConfig,
    Level,
    PulsePolicy,
    SequencerConfig,
};

/// Leading byte of every set-command frame
pub const SET_MARKER: u8 = 0xA0;

/// Single-byte status request
pub const QUERY_MARKER: u8 = 0xFF;

/// Length of a set-command frame in bytes
pub const SET_FRAME_LEN: usize = 4;

/// Addressable relay outputs on the CH340 board
pub const RELAY_COUNT: u8 = 4;

/// Status slots the board may report on
pub const STATUS_SLOTS: u8 = 8;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;
