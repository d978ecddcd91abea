use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::core::{Channel, Error, Result};
use crate::util::secs_to_duration;

/// Numbering used for relay numbers in a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelBase {
    /// `0` is the first relay
    Zero,
    /// `1` is the first relay, as printed on the board
    #[default]
    One,
}

/// Shape of a playlist source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    /// One `relay_number,duration_seconds` record per line
    Csv {
        /// How relay numbers are counted
        base: ChannelBase,
    },
    /// One hold time in seconds per line, every record on the same channel
    Legacy {
        /// Channel driven by every record
        channel: Channel,
    },
}

impl Default for PlaylistFormat {
    fn default() -> Self {
        PlaylistFormat::Csv { base: ChannelBase::One }
    }
}

/// One timed relay operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Relay to drive (0-indexed)
    pub channel: Channel,
    /// How long to hold the relay after switching it
    pub duration: Duration,
}

impl PlaylistEntry {
    /// Creates an entry
    pub fn new(channel: Channel, duration: Duration) -> Self {
        PlaylistEntry { channel, duration }
    }
}

/// Parses playlist text. Blank lines and lines starting with `#` are skipped.
pub fn parse_playlist(text: &str, format: PlaylistFormat) -> Result<Vec<PlaylistEntry>> {
    records(text)
        .map(|(line, record)| match format {
            PlaylistFormat::Csv { base } => parse_csv_record(line, record, base),
            PlaylistFormat::Legacy { channel } => parse_legacy_record(line, record, channel),
        })
        .collect()
}

fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| is_record(line))
}

fn is_record(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

fn parse_csv_record(line: usize, record: &str, base: ChannelBase) -> Result<PlaylistEntry> {
    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    let (relay, secs) = match fields.as_slice() {
        [relay, secs] => (*relay, *secs),
        _ => {
            return Err(Error::playlist(
                line,
                format!("expected `relay,seconds`, found {} fields", fields.len()),
            ))
        }
    };

    let relay: u8 = relay
        .parse()
        .map_err(|_| Error::playlist(line, format!("invalid relay number `{}`", relay)))?;
    let channel = match base {
        ChannelBase::Zero => Some(Channel::new(relay)),
        ChannelBase::One => Channel::from_number(relay),
    }
    .ok_or_else(|| Error::playlist(line, "relay numbers start at 1"))?;

    Ok(PlaylistEntry::new(channel, parse_seconds(line, secs)?))
}

fn parse_legacy_record(line: usize, record: &str, channel: Channel) -> Result<PlaylistEntry> {
    Ok(PlaylistEntry::new(channel, parse_seconds(line, record)?))
}

fn parse_seconds(line: usize, text: &str) -> Result<Duration> {
    let secs: f64 = text
        .parse()
        .map_err(|_| Error::playlist(line, format!("invalid duration `{}`", text)))?;
    secs_to_duration(secs).map_err(|_| Error::playlist(line, format!("invalid duration `{}`", text)))
}

/// A playlist stored on disk
#[derive(Debug, Clone)]
pub struct PlaylistFile {
    /// Path of the playlist
    pub path: PathBuf,
    /// How records are laid out
    pub format: PlaylistFormat,
    /// Remove each record from the file once it has been played
    pub consume_records: bool,
}

impl PlaylistFile {
    /// Creates a non-destructive playlist source
    pub fn new(path: impl AsRef<Path>, format: PlaylistFormat) -> Self {
        PlaylistFile {
            path: path.as_ref().to_path_buf(),
            format,
            consume_records: false,
        }
    }

    /// Makes playback delete each record from the file after it runs
    pub fn consuming(mut self) -> Self {
        self.consume_records = true;
        self
    }

    /// Reads and parses every record
    pub fn load(&self) -> Result<Vec<PlaylistEntry>> {
        let text = fs::read_to_string(&self.path)?;
        parse_playlist(&text, self.format)
    }

    /// Removes the first remaining record from the file
    pub fn consume_first_record(&self) -> Result<()> {
        let text = fs::read_to_string(&self.path)?;
        let mut removed = false;
        let mut remaining = String::with_capacity(text.len());
        for line in text.lines() {
            if !removed && is_record(line) {
                removed = true;
                continue;
            }
            remaining.push_str(line);
            remaining.push('\n');
        }
        fs::write(&self.path, remaining)?;
        Ok(())
    }
}
