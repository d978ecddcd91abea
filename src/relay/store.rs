use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{Channel, Level};

/// Best-known relay levels, shared by the status listener and the command issuer.
///
/// Every operation holds the one lock for its whole duration, so readers never
/// see a half-applied update. The lock is never held across I/O.
#[derive(Debug, Clone)]
pub struct RelayStateStore {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl RelayStateStore {
    /// Creates a store with `slots` channels, all OFF
    pub fn new(slots: u8) -> Self {
        RelayStateStore {
            levels: Arc::new(Mutex::new(vec![Level::Off; slots as usize])),
        }
    }

    /// Number of channels tracked
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when the store tracks no channels
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records `level` for `channel`; out-of-range channels are ignored
    pub fn set(&self, channel: Channel, level: Level) {
        if let Some(slot) = self.lock().get_mut(channel.index() as usize) {
            *slot = level;
        }
    }

    /// Returns the last known level of `channel`
    pub fn get(&self, channel: Channel) -> Option<Level> {
        self.lock().get(channel.index() as usize).copied()
    }

    /// Returns every channel's level in channel order
    pub fn snapshot(&self) -> Vec<(Channel, Level)> {
        self.lock()
            .iter()
            .enumerate()
            .map(|(index, level)| (Channel::new(index as u8), *level))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Level>> {
        // A panicking writer cannot leave a torn Level behind
        self.levels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RelayStateStore {
    fn default() -> Self {
        Self::new(crate::core::STATUS_SLOTS)
    }
}
