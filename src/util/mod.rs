//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::{ControllerConfig, Error, PulsePolicy, Result};

/// Source of monotonic time and blocking waits
pub trait Clock: Send + Sync {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Real time: `Instant::now` and `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock whose sleeps return immediately and advance virtual time.
///
/// Useful for dry-running a playlist to learn how long it would take.
#[derive(Debug)]
pub struct VirtualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl VirtualClock {
    /// Creates a clock starting at the current instant
    pub fn new() -> Self {
        VirtualClock {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Total virtual time slept so far
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += duration;
    }
}

/// Converts a floating-point number of seconds to a duration
pub fn secs_to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::config(format!("invalid duration: {} seconds", secs)))
}

/// Validates a controller configuration before any port is opened
pub fn validate_config(config: &ControllerConfig) -> Result<()> {
    if config.device.trim().is_empty() {
        return Err(Error::config("Device path is empty"));
    }
    if config.baud_rate == 0 {
        return Err(Error::config("Baud rate must be non-zero"));
    }
    if config.relay_count == 0 {
        return Err(Error::config("Board must have at least one relay"));
    }
    if config.status_slots < config.relay_count {
        return Err(Error::config("Status slots must cover every relay"));
    }
    if config.read_timeout.is_zero() {
        // A zero timeout turns the listener into a busy loop
        return Err(Error::config("Read timeout must be non-zero"));
    }
    if config.sequencer.min_hold.is_zero() {
        return Err(Error::config("Minimum hold must be non-zero"));
    }
    if let PulsePolicy::ResetPulse { settle } = config.sequencer.pulse {
        if settle.is_zero() {
            return Err(Error::config("Reset pulse settle delay must be non-zero"));
        }
    }
    Ok(())
}

/// Installs a formatting subscriber: INFO by default, DEBUG when verbose
pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // Another subscriber may already be installed by the host application
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
