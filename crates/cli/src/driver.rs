//! The poll loop that steps a [`BufferPump`] to completion.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use compress::Transform;
use tracing::{debug, trace};
use transfer::{BufferPump, Destination, PumpResult};
use transport::TransferSource;

use crate::error::CliError;
use crate::progress::ProgressReporter;

/// Pause between steps while the source has nothing to offer.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Steps a pump until it completes, fails, or idles past the timeout.
#[derive(Debug)]
pub(crate) struct Driver {
    idle_timeout: Option<Duration>,
    poll_interval: Duration,
    progress: Option<ProgressReporter>,
}

impl Driver {
    pub(crate) fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            idle_timeout,
            poll_interval: POLL_INTERVAL,
            progress: None,
        }
    }

    pub(crate) fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs `pump` to a terminal result.
    ///
    /// Progress lines go to `stderr`; a failure to print them does not
    /// affect the transfer. When no step moves any bytes for the idle
    /// timeout, the pump is cancelled and [`CliError::IdleTimeout`] returned.
    pub(crate) fn run<S, D, E, W>(
        &mut self,
        pump: &mut BufferPump<S, D, E>,
        stderr: &mut W,
    ) -> Result<(), CliError>
    where
        S: TransferSource,
        D: Destination,
        E: Transform,
        W: Write,
    {
        let started = Instant::now();
        let mut last_activity = started;
        if let Some(progress) = self.progress.as_mut() {
            progress.start(started);
        }

        loop {
            let result = pump.step();
            let now = Instant::now();
            let read = pump.stats().bytes_read;

            match result {
                PumpResult::Progressed => {
                    last_activity = now;
                    if let Some(progress) = self.progress.as_mut() {
                        let _ = progress.observe(read, now, stderr);
                    }
                }
                PumpResult::WaitingOnChannel => {
                    if let Some(limit) = self.idle_timeout {
                        if now.saturating_duration_since(last_activity) >= limit {
                            debug!(?limit, "idle timeout reached");
                            pump.cancel();
                            return Err(CliError::IdleTimeout(limit));
                        }
                    }
                    trace!("waiting on channel");
                    thread::sleep(self.poll_interval);
                }
                PumpResult::Complete => {
                    self.report_final(read, now, stderr);
                    return Ok(());
                }
                PumpResult::Failed(error) => {
                    self.report_final(read, now, stderr);
                    return Err(error.into());
                }
            }
        }
    }

    fn report_final<W: Write>(&mut self, read: u64, now: Instant, stderr: &mut W) {
        if let Some(progress) = self.progress.as_mut() {
            let _ = progress.finish(read, now, stderr);
        }
    }
}
