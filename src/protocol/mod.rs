//! Protocol implementation module
//!
//! This module defines the CH340 relay board's binary command frames and the
//! decoding of the ASCII status lines the board prints back.

pub mod codec;
pub mod frame;

pub use self::codec::{LineCodec, RelayCodec, MAX_LINE_LENGTH};
pub use self::frame::{CommandFrame, Decoded, StatusEvent};
