use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{Channel, ControllerConfig, Level, Result};
use crate::protocol::RelayCodec;
use crate::transport::{SerialTransport, TransportReader, TransportWriter};
use crate::util::{validate_config, Clock, SystemClock};
use super::channel::SerialChannel;
use super::listener::{ListenerState, StatusListener};
use super::playlist::{PlaylistEntry, PlaylistFile};
use super::sequencer::{CommandSequencer, SequenceReport};
use super::store::RelayStateStore;

/// Owns an open relay board: the serial channel, the status listener, and the
/// sequencer that drives relays through them.
///
/// Dropping the controller closes it.
pub struct RelayController {
    config: ControllerConfig,
    codec: RelayCodec,
    channel: Arc<SerialChannel>,
    store: RelayStateStore,
    listener: StatusListener,
    sequencer: CommandSequencer,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl RelayController {
    /// Opens the configured serial device and starts the status listener.
    ///
    /// Failing to open the port is fatal: nothing else could succeed.
    pub fn open(config: ControllerConfig) -> Result<Self> {
        validate_config(&config)?;
        let (reader, writer) =
            SerialTransport::open(&config.device, config.baud_rate, config.read_timeout)?;
        info!(device = %config.device, baud_rate = config.baud_rate, "relay controller opened");
        Self::with_transport(config, reader, writer, Arc::new(SystemClock))
    }

    /// Builds a controller over an already opened transport
    pub fn with_transport<R, W>(
        config: ControllerConfig,
        reader: R,
        writer: W,
        clock: Arc<dyn Clock>,
    ) -> Result<Self>
    where
        R: TransportReader + 'static,
        W: TransportWriter + 'static,
    {
        validate_config(&config)?;

        let codec = RelayCodec::from_config(&config);
        let channel = Arc::new(SerialChannel::new(codec, reader, writer));
        let store = RelayStateStore::new(codec.status_slots());
        let listener = StatusListener::spawn(
            Arc::clone(&channel),
            codec,
            store.clone(),
            config.read_timeout,
        )?;
        let sequencer = CommandSequencer::new(
            Arc::clone(&channel),
            store.clone(),
            codec,
            Arc::clone(&clock),
            config.sequencer.clone(),
        );

        Ok(RelayController {
            config,
            codec,
            channel,
            store,
            listener,
            sequencer,
            clock,
            closed: false,
        })
    }

    /// Controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Shared relay state
    pub fn state(&self) -> &RelayStateStore {
        &self.store
    }

    /// Last known level of `channel`
    pub fn level(&self, channel: Channel) -> Option<Level> {
        self.store.get(channel)
    }

    /// Lifecycle state of the status listener
    pub fn listener_state(&self) -> ListenerState {
        self.listener.state()
    }

    /// Switches one relay and holds it for `duration`
    pub fn set_relay(&self, channel: Channel, on: bool, duration: Duration) -> Result<()> {
        self.sequencer.run_single(channel, Level::from(on), duration)
    }

    /// Asks the board for its status, gives the listener time to absorb the
    /// replies, and returns the resulting state
    pub fn query_status(&self) -> Result<Vec<(Channel, Level)>> {
        debug!("Checking status");
        self.channel.write_frame(&self.codec.encode_query())?;
        self.clock.sleep(self.config.status_wait);
        Ok(self.store.snapshot())
    }

    /// Plays a sequence of timed relay operations
    pub fn run_sequence(&self, entries: &[PlaylistEntry]) -> Result<SequenceReport> {
        self.sequencer.run_sequence(entries)
    }

    /// Loads a playlist file and plays it, consuming records if requested
    pub fn play_file(&self, playlist: &PlaylistFile) -> Result<SequenceReport> {
        let entries = playlist.load()?;
        info!(path = %playlist.path.display(), entries = entries.len(), "playing file");

        if playlist.consume_records {
            self.sequencer
                .run_sequence_with(&entries, |_, _| playlist.consume_first_record())
        } else {
            self.sequencer.run_sequence(&entries)
        }
    }

    /// Stops the listener and releases the port. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.listener.request_stop();
        self.channel.close();
        self.listener.join();
        self.channel.release_reader();
        info!("Serial port closed");
    }
}

impl Drop for RelayController {
    fn drop(&mut self) {
        self.close();
    }
}
