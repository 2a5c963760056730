use std::time::{Duration, Instant};

/// Byte counter paired with the time window it was measured over.
///
/// A meter is idle until [`start`](Self::start) and stops accumulating once
/// [`freeze`](Self::freeze) is called; a frozen meter keeps reporting the
/// rate observed at the freeze instant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RateMeter {
    bytes: u64,
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl RateMeter {
    /// Creates an idle meter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: 0,
            started: None,
            stopped: None,
        }
    }

    /// Starts a fresh measurement window at `now`, discarding prior counts.
    pub fn start(&mut self, now: Instant) {
        *self = Self {
            bytes: 0,
            started: Some(now),
            stopped: None,
        };
    }

    /// Adds `bytes` to the running total.
    ///
    /// Ignored while the meter is idle or frozen.
    pub fn record(&mut self, bytes: usize) {
        if self.is_running() {
            self.bytes = self.bytes.saturating_add(bytes as u64);
        }
    }

    /// Stops the measurement window at `now`.
    pub fn freeze(&mut self, now: Instant) {
        if self.is_running() {
            self.stopped = Some(now);
        }
    }

    /// Returns to the idle state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Total bytes recorded in the current window.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns `true` between [`start`](Self::start) and [`freeze`](Self::freeze).
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started.is_some() && self.stopped.is_none()
    }

    /// Returns `true` once the window has been frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.stopped.is_some()
    }

    /// Length of the measurement window as seen from `now`.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started {
            Some(started) => self.stopped.unwrap_or(now).saturating_duration_since(started),
            None => Duration::ZERO,
        }
    }

    /// Average throughput of the window, or `0.0` when nothing has been
    /// recorded or no time has passed.
    #[must_use]
    pub fn bytes_per_second(&self, now: Instant) -> f64 {
        let elapsed = self.elapsed(now);
        if self.bytes == 0 || elapsed.is_zero() {
            return 0.0;
        }
        self.bytes as f64 / elapsed.as_secs_f64()
    }
}
