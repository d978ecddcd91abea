//! CH340 relay: control of serial multi-channel relay boards
//!
//! This library drives CH340-based relay modules over a serial link: it encodes
//! the board's binary set/query frames, decodes the status lines the board
//! prints back on a background listener, and replays timed relay playlists.
pub mod core;
pub mod protocol;
pub mod relay;
pub mod transport;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Channel, ControllerConfig, Error, Level, Result};
pub use crate::relay::RelayController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
