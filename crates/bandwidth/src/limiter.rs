use std::num::NonZeroU64;
use std::time::{Duration, Instant};

const MICROS_PER_SECOND: u128 = 1_000_000;
const MIN_WRITE_MAX: usize = 512;

/// Bucket capacity for `limit`: 128 bytes per KiB/s of rate, never below
/// [`MIN_WRITE_MAX`]. An explicit burst replaces the computed value.
fn calculate_write_max(limit: NonZeroU64, burst: Option<NonZeroU64>) -> usize {
    if let Some(burst) = burst {
        return usize::try_from(burst.get())
            .unwrap_or(usize::MAX)
            .max(MIN_WRITE_MAX);
    }

    let kib = (limit.get() / 1024).max(1);
    let write_max = u128::from(kib).saturating_mul(128);
    usize::try_from(write_max)
        .unwrap_or(usize::MAX)
        .max(MIN_WRITE_MAX)
}

/// Token-bucket throttle that reports how much may move instead of sleeping.
///
/// The bucket holds at most [`write_max_bytes`](Self::write_max_bytes) of
/// credit and refills at [`limit_bytes`](Self::limit_bytes) per second.
/// Every registered byte is debt; [`allowance`](Self::allowance) is the
/// capacity left after subtracting the debt that elapsed time has not yet
/// repaid. Instants are supplied by the caller so the limiter works with
/// any [`Clock`](crate::Clock).
#[doc(alias = "--bwlimit")]
#[derive(Clone, Debug)]
pub struct BandwidthLimiter {
    limit_bytes: NonZeroU64,
    write_max: usize,
    burst_bytes: Option<NonZeroU64>,
    debt: u128,
    last_instant: Option<Instant>,
}

impl BandwidthLimiter {
    /// Constructs a limiter for the supplied byte-per-second rate.
    #[must_use]
    pub fn new(limit: NonZeroU64) -> Self {
        Self::with_burst(limit, None)
    }

    /// Constructs a limiter from a rate and an optional burst size.
    #[must_use]
    pub fn with_burst(limit: NonZeroU64, burst: Option<NonZeroU64>) -> Self {
        Self {
            limit_bytes: limit,
            write_max: calculate_write_max(limit, burst),
            burst_bytes: burst,
            debt: 0,
            last_instant: None,
        }
    }

    /// Applies a new rate while keeping the burst, and clears accumulated debt.
    pub fn update_limit(&mut self, limit: NonZeroU64) {
        *self = Self::with_burst(limit, self.burst_bytes);
    }

    /// Clears accumulated debt while keeping the configuration.
    pub fn reset(&mut self) {
        self.debt = 0;
        self.last_instant = None;
    }

    /// Returns the configured limit in bytes per second.
    #[must_use]
    pub const fn limit_bytes(&self) -> NonZeroU64 {
        self.limit_bytes
    }

    /// Returns the configured burst size in bytes, if any.
    #[must_use]
    pub const fn burst_bytes(&self) -> Option<NonZeroU64> {
        self.burst_bytes
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub const fn write_max_bytes(&self) -> usize {
        self.write_max
    }

    /// Bytes that may be transferred at `now` without exceeding the rate.
    pub fn allowance(&mut self, now: Instant) -> usize {
        self.settle(now);
        let remaining = (self.write_max as u128).saturating_sub(self.debt);
        usize::try_from(remaining).unwrap_or(usize::MAX)
    }

    /// Clamps a read of `buffer_len` bytes to the current allowance.
    pub fn recommended_read_size(&mut self, buffer_len: usize, now: Instant) -> usize {
        buffer_len.min(self.allowance(now))
    }

    /// Records `bytes` transferred at `now`.
    pub fn register(&mut self, bytes: usize, now: Instant) {
        if bytes == 0 {
            return;
        }
        self.settle(now);
        self.debt = self.debt.saturating_add(bytes as u128);
        if self.burst_bytes.is_some() {
            // Capping below the bucket capacity would leave permanent credit.
            self.debt = self.debt.min(self.write_max as u128);
        }
    }

    /// Time until at least one byte of allowance is available.
    pub fn delay(&mut self, now: Instant) -> Duration {
        self.settle(now);
        let capacity = self.write_max as u128;
        if self.debt < capacity {
            return Duration::ZERO;
        }

        let excess = self.debt - capacity + 1;
        let rate = u128::from(self.limit_bytes.get());
        let micros = excess
            .saturating_mul(MICROS_PER_SECOND)
            .div_ceil(rate);
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }

    #[cfg(test)]
    pub(crate) const fn debt_for_testing(&self) -> u128 {
        self.debt
    }

    /// Repays debt for the time elapsed since the last repayment.
    ///
    /// The reference instant only advances once at least one byte has been
    /// repaid, so frequent polls do not lose fractional credit.
    fn settle(&mut self, now: Instant) {
        let Some(previous) = self.last_instant else {
            self.last_instant = Some(now);
            return;
        };

        let elapsed = now.saturating_duration_since(previous).as_micros();
        let repaid = elapsed.saturating_mul(u128::from(self.limit_bytes.get())) / MICROS_PER_SECOND;
        if repaid > 0 {
            self.debt = self.debt.saturating_sub(repaid);
            self.last_instant = Some(now);
        }
    }
}
