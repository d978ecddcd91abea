use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::core::{Error, Result};
use crate::protocol::{CommandFrame, RelayCodec};
use crate::transport::{TransportReader, TransportWriter};

/// Guards the serial link shared by the command issuer and the status listener.
///
/// Writes are serialized through one lock so two frames never interleave on the
/// wire. Reads use a separate lock on the independent read half, so a status
/// read never waits for a write and a write never waits for a read.
pub struct SerialChannel {
    codec: RelayCodec,
    writer: Mutex<Option<Box<dyn TransportWriter>>>,
    reader: Mutex<Option<Box<dyn TransportReader>>>,
    closed: AtomicBool,
}

impl SerialChannel {
    /// Wraps the two halves of an opened transport
    pub fn new<R, W>(codec: RelayCodec, reader: R, writer: W) -> Self
    where
        R: TransportReader + 'static,
        W: TransportWriter + 'static,
    {
        SerialChannel {
            codec,
            writer: Mutex::new(Some(Box::new(writer))),
            reader: Mutex::new(Some(Box::new(reader))),
            closed: AtomicBool::new(false),
        }
    }

    /// Writes every byte of `frame` while holding the write lock
    pub fn write_frame(&self, frame: &CommandFrame) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let mut codec = self.codec;
        let mut buf = BytesMut::with_capacity(frame.len());
        codec.encode(*frame, &mut buf)?;

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let writer = writer.as_mut().ok_or(Error::TransportClosed)?;
        writer.write_bytes(&buf)?;

        trace!(frame = %frame, "frame written");
        Ok(())
    }

    /// Reads one line from the read half
    pub fn read_line(&self, timeout: Duration) -> Result<Bytes> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let reader = reader.as_mut().ok_or(Error::TransportClosed)?;
        reader.read_line(timeout)
    }

    /// Marks the channel closed and releases the transport. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Waits for an in-flight write to finish before dropping the handle
        self.writer.lock().unwrap_or_else(|e| e.into_inner()).take();
        // The listener may be mid-read; it drops nothing and exits on its next call
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        debug!("serial channel closed");
    }

    /// Drops the read half, waiting for a read in progress to return.
    ///
    /// Call once the reading thread has stopped; `close` cannot release a
    /// reader that is mid-read.
    pub fn release_reader(&self) {
        if self.reader.lock().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            debug!("serial read half released");
        }
    }

    /// Returns whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use crate::core::{Channel, Level};
    use crate::transport::mock::MockTransport;

    fn channel_over(mock: &MockTransport) -> SerialChannel {
        let (reader, writer) = mock.split();
        SerialChannel::new(RelayCodec::default(), reader, writer)
    }

    fn set(index: u8, level: Level) -> CommandFrame {
        CommandFrame::Set { channel: Channel::new(index), level }
    }

    #[test]
    fn test_write_frame_sends_bytes() {
        let mock = MockTransport::new();
        let channel = channel_over(&mock);

        channel.write_frame(&set(0, Level::On)).unwrap();
        channel.write_frame(&CommandFrame::Query).unwrap();

        assert_eq!(mock.writes(), vec![vec![0xA0, 0x01, 0x01, 0xA2], vec![0xFF]]);
    }

    #[test]
    fn test_out_of_range_frame_never_reaches_transport() {
        let mock = MockTransport::new();
        let channel = channel_over(&mock);

        let result = channel.write_frame(&set(5, Level::On));
        assert!(matches!(result, Err(Error::InvalidChannel { channel: 5, .. })));
        assert!(mock.stream().is_empty());
    }

    #[test]
    fn test_write_after_close_fails() {
        let mock = MockTransport::new();
        let channel = channel_over(&mock);

        channel.close();
        channel.close();
        assert!(channel.is_closed());
        assert!(matches!(channel.write_frame(&set(0, Level::On)), Err(Error::TransportClosed)));
        assert!(matches!(channel.read_line(Duration::from_millis(1)), Err(Error::TransportClosed)));
        assert!(mock.writes().is_empty());
        assert_eq!(mock.open_readers(), 0);
        assert_eq!(mock.open_writers(), 0);
    }

    #[test]
    fn test_reader_released_after_read_in_progress() {
        let mock = MockTransport::new();
        let channel = Arc::new(channel_over(&mock));

        let reading = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.read_line(Duration::from_millis(500)))
        };
        thread::sleep(Duration::from_millis(50));

        channel.close();
        assert_eq!(mock.open_writers(), 0);
        assert_eq!(mock.open_readers(), 1);

        assert!(matches!(reading.join().unwrap(), Err(Error::Timeout)));
        channel.release_reader();
        channel.release_reader();
        assert_eq!(mock.open_readers(), 0);
    }

    #[test]
    fn test_write_errors_propagate() {
        let mock = MockTransport::new();
        mock.fail_write(0, std::io::ErrorKind::Other);
        let channel = channel_over(&mock);

        assert!(matches!(channel.write_frame(&set(1, Level::On)), Err(Error::Io(_))));
        assert!(channel.write_frame(&set(1, Level::On)).is_ok());
    }

    #[test]
    fn test_concurrent_writes_never_interleave() {
        let mock = MockTransport::new();
        let channel = Arc::new(channel_over(&mock));

        let writers: Vec<_> = [(0u8, Level::On), (3u8, Level::Off)]
            .into_iter()
            .map(|(index, level)| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for _ in 0..50 {
                        channel.write_frame(&set(index, level)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stream = mock.stream();
        assert_eq!(stream.len(), 100 * 4);
        for chunk in stream.chunks(4) {
            let frame = CommandFrame::parse(chunk).unwrap();
            assert!(frame == set(0, Level::On) || frame == set(3, Level::Off));
        }
    }

    #[test]
    fn test_reads_do_not_wait_for_writes() {
        let mock = MockTransport::new().with_byte_delay(Duration::from_millis(100));
        let channel = Arc::new(channel_over(&mock));

        let writer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.write_frame(&set(0, Level::On)))
        };
        thread::sleep(Duration::from_millis(20));

        mock.push_line("CH1: ON");
        let started = Instant::now();
        let line = channel.read_line(Duration::from_millis(10)).unwrap();
        assert_eq!(&line[..], b"CH1: ON");
        assert!(started.elapsed() < Duration::from_millis(300));

        writer.join().unwrap().unwrap();
    }
}
