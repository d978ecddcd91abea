//! Scripted in-memory transport for tests

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::core::{Error, Result};
use super::{TransportReader, TransportWriter};

enum Incoming {
    Line(Bytes),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct MockState {
    incoming: VecDeque<Incoming>,
    writes: Vec<Vec<u8>>,
    stream: Vec<u8>,
    write_calls: usize,
    write_failures: HashMap<usize, io::ErrorKind>,
    open_readers: usize,
    open_writers: usize,
}

/// Shared handle for scripting reads and inspecting writes
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
    byte_delay: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Writes one byte at a time, pausing between bytes
    pub(crate) fn with_byte_delay(mut self, delay: Duration) -> Self {
        self.byte_delay = Some(delay);
        self
    }

    pub(crate) fn split(&self) -> (MockReader, MockWriter) {
        {
            let mut state = self.lock();
            state.open_readers += 1;
            state.open_writers += 1;
        }
        (
            MockReader { transport: self.clone() },
            MockWriter { transport: self.clone() },
        )
    }

    pub(crate) fn push_line(&self, line: &str) {
        self.lock().incoming.push_back(Incoming::Line(Bytes::copy_from_slice(line.as_bytes())));
    }

    pub(crate) fn push_read_error(&self, kind: io::ErrorKind) {
        self.lock().incoming.push_back(Incoming::Fail(kind));
    }

    /// Makes the write call with 0-based index `call` fail
    pub(crate) fn fail_write(&self, call: usize, kind: io::ErrorKind) {
        self.lock().write_failures.insert(call, kind);
    }

    /// Successful write calls, in completion order
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every byte written, in arrival order
    pub(crate) fn stream(&self) -> Vec<u8> {
        self.lock().stream.clone()
    }

    pub(crate) fn pending_reads(&self) -> usize {
        self.lock().incoming.len()
    }

    /// Read halves handed out by `split` and not yet dropped
    pub(crate) fn open_readers(&self) -> usize {
        self.lock().open_readers
    }

    /// Write halves handed out by `split` and not yet dropped
    pub(crate) fn open_writers(&self) -> usize {
        self.lock().open_writers
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) struct MockReader {
    transport: MockTransport,
}

impl TransportReader for MockReader {
    fn read_line(&mut self, timeout: Duration) -> Result<Bytes> {
        let next = self.transport.lock().incoming.pop_front();
        match next {
            Some(Incoming::Line(line)) => Ok(line),
            Some(Incoming::Fail(kind)) => Err(io::Error::from(kind).into()),
            None => {
                thread::sleep(timeout);
                Err(Error::Timeout)
            }
        }
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.transport.lock().open_readers -= 1;
    }
}

pub(crate) struct MockWriter {
    transport: MockTransport,
}

impl TransportWriter for MockWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        {
            let mut state = self.transport.lock();
            let call = state.write_calls;
            state.write_calls += 1;
            if let Some(kind) = state.write_failures.remove(&call) {
                return Err(io::Error::from(kind).into());
            }
        }

        for byte in bytes {
            self.transport.lock().stream.push(*byte);
            match self.transport.byte_delay {
                Some(delay) => thread::sleep(delay),
                None => thread::yield_now(),
            }
        }

        self.transport.lock().writes.push(bytes.to_vec());
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.transport.lock().open_writers -= 1;
    }
}
