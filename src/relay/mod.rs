//! Relay control engine
//!
//! Components, leaves first:
//!
//! - [`RelayStateStore`]: lock-guarded best-known level of every channel
//! - [`SerialChannel`]: serializes writes, keeps reads on the independent half
//! - [`StatusListener`]: background thread folding status lines into the store
//! - [`CommandSequencer`]: timed single commands and playlist playback
//! - [`RelayController`]: owns all of the above for one open board
//!
//! # Examples
//!
//! ```no_run
//! use ch340_relay::core::{Channel, ControllerConfig};
//! use ch340_relay::relay::{PlaylistFile, PlaylistFormat, RelayController};
//! use std::time::Duration;
//!
//! let mut relay = RelayController::open(ControllerConfig::for_device("/dev/ttyUSB0")).unwrap();
//! relay.set_relay(Channel::new(0), true, Duration::from_secs(5)).unwrap();
//!
//! let report = relay
//!     .play_file(&PlaylistFile::new("playfile.txt", PlaylistFormat::default()))
//!     .unwrap();
//! println!("cycle took {:?}", report.elapsed);
//! relay.close();
//! ```

mod channel;
mod controller;
mod listener;
mod playlist;
mod sequencer;
mod store;

pub use self::channel::SerialChannel;
pub use self::controller::RelayController;
pub use self::listener::{ListenerState, StatusListener};
pub use self::playlist::{parse_playlist, ChannelBase, PlaylistEntry, PlaylistFile, PlaylistFormat};
pub use self::sequencer::{CommandSequencer, EntryFailure, SequenceReport};
pub use self::store::RelayStateStore;
