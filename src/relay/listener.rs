use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::{Error, Result};
use crate::protocol::{Decoded, RelayCodec, StatusEvent};
use super::channel::SerialChannel;
use super::store::RelayStateStore;

/// Lifecycle of the status listener thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Reading and decoding lines
    Running,
    /// Exit condition seen, loop unwinding
    Stopping,
    /// Thread finished
    Stopped,
}

/// Background reader that folds the board's status lines into the state store
pub struct StatusListener {
    state: Arc<Mutex<ListenerState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

struct ListenLoop {
    channel: Arc<SerialChannel>,
    codec: RelayCodec,
    store: RelayStateStore,
    read_timeout: Duration,
    state: Arc<Mutex<ListenerState>>,
    stop: Arc<AtomicBool>,
}

impl StatusListener {
    /// Starts the listener thread in the Running state
    pub fn spawn(
        channel: Arc<SerialChannel>,
        codec: RelayCodec,
        store: RelayStateStore,
        read_timeout: Duration,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(ListenerState::Running));
        let stop = Arc::new(AtomicBool::new(false));

        let listen = ListenLoop {
            channel,
            codec,
            store,
            read_timeout,
            state: Arc::clone(&state),
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name("relay-status".to_string())
            .spawn(move || listen.run())?;

        Ok(StatusListener {
            state,
            stop,
            handle: Some(handle),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ListenerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Asks the thread to exit after its current read
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ListenerState::Running {
            *state = ListenerState::Stopping;
        }
    }

    /// Waits for the thread to finish. Idempotent.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("status listener thread panicked");
                *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ListenerState::Stopped;
            }
        }
    }
}

impl Drop for StatusListener {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

impl ListenLoop {
    fn run(self) {
        debug!("status listener running");

        while !self.stop.load(Ordering::SeqCst) {
            match self.channel.read_line(self.read_timeout) {
                Ok(line) => self.handle_line(&line),
                Err(e) if e.is_timeout() => continue,
                Err(Error::TransportClosed) => {
                    debug!("transport closed, status listener exiting");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "status listener stopping after transport failure");
                    break;
                }
            }
        }

        self.set_state(ListenerState::Stopping);
        self.store_snapshot_debug();
        self.set_state(ListenerState::Stopped);
        info!("status listener stopped");
    }

    fn handle_line(&self, line: &[u8]) {
        match self.codec.decode_line(line) {
            Decoded::Empty => {}
            Decoded::Raw(text) => debug!(line = %text, "relay board output"),
            Decoded::Status(StatusEvent { channel: Some(channel), level }) => {
                self.store.set(channel, level);
                debug!(channel = %channel, level = %level, "relay status");
            }
            Decoded::Status(StatusEvent { channel: None, level }) => {
                debug!(level = %level, "discarding status for unknown channel");
            }
        }
    }

    fn store_snapshot_debug(&self) {
        for (channel, level) in self.store.snapshot() {
            debug!(channel = %channel, level = %level, "last known level");
        }
    }

    fn set_state(&self, state: ListenerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Instant;

    use crate::core::{Channel, Level};
    use crate::transport::mock::MockTransport;

    const READ_TIMEOUT: Duration = Duration::from_millis(20);

    fn start(mock: &MockTransport) -> (Arc<SerialChannel>, RelayStateStore, StatusListener) {
        let (reader, writer) = mock.split();
        let codec = RelayCodec::default();
        let channel = Arc::new(SerialChannel::new(codec, reader, writer));
        let store = RelayStateStore::new(codec.status_slots());
        let listener =
            StatusListener::spawn(Arc::clone(&channel), codec, store.clone(), READ_TIMEOUT).unwrap();
        (channel, store, listener)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_status_line_updates_one_channel() {
        let mock = MockTransport::new();
        let (channel, store, mut listener) = start(&mock);
        assert_eq!(listener.state(), ListenerState::Running);

        mock.push_line("CH2: ON");
        assert!(wait_until(|| store.get(Channel::new(1)) == Some(Level::On)));

        let on: Vec<_> = store.snapshot().into_iter().filter(|(_, level)| level.is_on()).collect();
        assert_eq!(on, vec![(Channel::new(1), Level::On)]);

        channel.close();
        listener.join();
    }

    #[test]
    fn test_malformed_and_unknown_lines_leave_store_unchanged() {
        let mock = MockTransport::new();
        let (channel, store, mut listener) = start(&mock);
        let before = store.snapshot();

        mock.push_line("garbage\n");
        mock.push_line("");
        mock.push_line("CH9: ON");
        mock.push_line("CH3: MAYBE");
        assert!(wait_until(|| mock.pending_reads() == 0));
        thread::sleep(READ_TIMEOUT * 2);
        assert_eq!(store.snapshot(), before);
        assert_eq!(listener.state(), ListenerState::Running);

        channel.close();
        listener.join();
    }

    #[test]
    fn test_transport_failure_stops_listener() {
        let mock = MockTransport::new();
        let (_channel, store, mut listener) = start(&mock);

        mock.push_read_error(io::ErrorKind::BrokenPipe);
        mock.push_line("CH1: ON");
        assert!(wait_until(|| listener.state() == ListenerState::Stopped));
        listener.join();

        assert_eq!(mock.pending_reads(), 1);
        assert_eq!(store.get(Channel::new(0)), Some(Level::Off));
    }

    #[test]
    fn test_timeouts_keep_listener_running() {
        let mock = MockTransport::new();
        let (channel, store, mut listener) = start(&mock);

        mock.push_read_error(io::ErrorKind::TimedOut);
        thread::sleep(READ_TIMEOUT * 3);
        assert_eq!(listener.state(), ListenerState::Running);

        mock.push_line("CH4: ON");
        assert!(wait_until(|| store.get(Channel::new(3)) == Some(Level::On)));

        channel.close();
        listener.join();
    }

    #[test]
    fn test_close_stops_within_read_timeout() {
        let mock = MockTransport::new();
        let (channel, _store, mut listener) = start(&mock);
        thread::sleep(READ_TIMEOUT);

        let started = Instant::now();
        listener.request_stop();
        channel.close();
        listener.join();

        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(started.elapsed() < READ_TIMEOUT + Duration::from_millis(200));
    }
}
