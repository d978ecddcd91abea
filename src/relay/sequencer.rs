use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::{Channel, Level, PulsePolicy, Result, SequencerConfig};
use crate::core::serde::{serialize_duration, serialize_timestamp};
use crate::protocol::RelayCodec;
use crate::util::Clock;
use super::channel::SerialChannel;
use super::playlist::PlaylistEntry;
use super::store::RelayStateStore;

/// An entry that could not be played
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryFailure {
    /// Position of the entry in the sequence
    pub index: usize,
    /// Channel the entry targeted
    pub channel: Channel,
    /// Why it failed
    pub error: String,
}

/// Outcome of one sequence run
#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    /// Wall-clock start of the cycle
    #[serde(serialize_with = "serialize_timestamp")]
    pub started_at: DateTime<Local>,
    /// Wall-clock end of the cycle
    #[serde(serialize_with = "serialize_timestamp")]
    pub finished_at: DateTime<Local>,
    /// Total time spent, including every hold
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    /// Entries that ran to completion
    pub played: usize,
    /// Entries that failed and were skipped
    pub failures: Vec<EntryFailure>,
}

impl SequenceReport {
    /// Returns true when every entry played
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replays timed relay operations through the serial channel
pub struct CommandSequencer {
    channel: Arc<SerialChannel>,
    store: RelayStateStore,
    codec: RelayCodec,
    clock: Arc<dyn Clock>,
    config: SequencerConfig,
}

impl CommandSequencer {
    /// Creates a new sequencer
    pub fn new(
        channel: Arc<SerialChannel>,
        store: RelayStateStore,
        codec: RelayCodec,
        clock: Arc<dyn Clock>,
        config: SequencerConfig,
    ) -> Self {
        CommandSequencer {
            channel,
            store,
            codec,
            clock,
            config,
        }
    }

    /// Sequencer settings
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Switches one relay, records the new level, then holds for `duration`.
    ///
    /// The hold never drops below the configured minimum so the next command
    /// cannot overlap this one on the board.
    pub fn run_single(&self, channel: Channel, level: Level, duration: Duration) -> Result<()> {
        let frame = self.codec.encode_set(channel, level)?;
        self.channel.write_frame(&frame)?;
        self.store.set(channel, level);

        let hold = duration.max(self.config.min_hold);
        debug!(channel = %channel, level = %level, hold = ?hold, "relay set");
        self.clock.sleep(hold);
        Ok(())
    }

    /// Plays `entries` in order. Failing entries are logged and skipped; a lost
    /// transport aborts the run.
    pub fn run_sequence(&self, entries: &[PlaylistEntry]) -> Result<SequenceReport> {
        self.run_sequence_with(entries, |_, _| Ok(()))
    }

    /// Like [`run_sequence`](Self::run_sequence), calling `after_entry` once
    /// each entry has been attempted
    pub fn run_sequence_with<F>(&self, entries: &[PlaylistEntry], mut after_entry: F) -> Result<SequenceReport>
    where
        F: FnMut(usize, &PlaylistEntry) -> Result<()>,
    {
        let started_at = Local::now();
        let start = self.clock.now();
        info!(entries = entries.len(), "Cycle start");

        let mut played = 0;
        let mut failures = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            info!(
                index,
                channel = %entry.channel,
                seconds = entry.duration.as_secs_f64(),
                "Manipulating circuit"
            );

            match self.play_entry(entry) {
                Ok(()) => played += 1,
                Err(e) if e.is_transport_lost() => {
                    error!(index, error = %e, "transport lost, aborting sequence");
                    return Err(e);
                }
                Err(e) => {
                    warn!(index, channel = %entry.channel, error = %e, "entry failed, continuing");
                    failures.push(EntryFailure {
                        index,
                        channel: entry.channel,
                        error: e.to_string(),
                    });
                }
            }

            if let Err(e) = after_entry(index, entry) {
                warn!(index, error = %e, "post-entry step failed");
            }
        }

        if self.config.release_on_finish {
            if let Some(last) = entries.last() {
                if let Err(e) = self.run_single(last.channel, Level::Off, self.config.min_hold) {
                    warn!(channel = %last.channel, error = %e, "release after sequence failed");
                }
            }
        }

        let elapsed = self.clock.now().saturating_duration_since(start);
        let finished_at = Local::now();
        info!(played, failed = failures.len(), "Cycle finish");
        info!(elapsed = ?elapsed, "Cycle time total");

        Ok(SequenceReport {
            started_at,
            finished_at,
            elapsed,
            played,
            failures,
        })
    }

    fn play_entry(&self, entry: &PlaylistEntry) -> Result<()> {
        if let PulsePolicy::ResetPulse { settle } = self.config.pulse {
            self.run_single(entry.channel, Level::Off, settle)?;
        }
        self.run_single(entry.channel, Level::On, entry.duration)
    }
}
