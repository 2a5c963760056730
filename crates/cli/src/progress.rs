//! `--progress` rate lines.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use bandwidth::RateMeter;

/// Minimum spacing between intermediate progress lines.
pub(crate) const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Prints `"<bytes_per_second> B/s"` lines while a transfer runs.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    meter: RateMeter,
    seen: u64,
    last_line: Option<Instant>,
    interval: Duration,
}

impl ProgressReporter {
    pub(crate) fn new() -> Self {
        Self::with_interval(PROGRESS_INTERVAL)
    }

    pub(crate) fn with_interval(interval: Duration) -> Self {
        Self {
            meter: RateMeter::new(),
            seen: 0,
            last_line: None,
            interval,
        }
    }

    /// Opens the measurement window.
    pub(crate) fn start(&mut self, now: Instant) {
        self.meter.start(now);
        self.seen = 0;
        self.last_line = Some(now);
    }

    /// Records the running byte total and prints a line once per interval.
    pub(crate) fn observe<W: Write>(&mut self, total: u64, now: Instant, out: &mut W) -> io::Result<()> {
        self.record(total);
        let due = self
            .last_line
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_line = Some(now);
            self.print(now, out)?;
        }
        Ok(())
    }

    /// Closes the window and prints the final rate.
    pub(crate) fn finish<W: Write>(&mut self, total: u64, now: Instant, out: &mut W) -> io::Result<()> {
        self.record(total);
        self.meter.freeze(now);
        self.print(now, out)
    }

    fn record(&mut self, total: u64) {
        if total > self.seen {
            let delta = usize::try_from(total - self.seen).unwrap_or(usize::MAX);
            self.meter.record(delta);
            self.seen = total;
        }
    }

    fn print<W: Write>(&self, now: Instant, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", format_rate(self.meter.bytes_per_second(now)))
    }
}

/// Renders a rate the way progress lines show it.
pub(crate) fn format_rate(bytes_per_second: f64) -> String {
    format!("{bytes_per_second:.1} B/s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn million_bytes_over_two_seconds() {
        let start = Instant::now();
        let mut reporter = ProgressReporter::new();
        reporter.start(start);

        let mut out = Vec::new();
        reporter
            .finish(1_000_000, start + Duration::from_secs(2), &mut out)
            .expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "500000.0 B/s\n");
    }

    #[test]
    fn lines_are_spaced_by_the_interval() {
        let start = Instant::now();
        let mut reporter = ProgressReporter::with_interval(Duration::from_secs(1));
        reporter.start(start);

        let mut out = Vec::new();
        for millis in (100..=2_500).step_by(100) {
            let now = start + Duration::from_millis(millis);
            reporter.observe(millis * 10, now, &mut out).expect("write");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().count(), 2, "{text}");
        assert!(text.lines().all(|line| line.ends_with(" B/s")));
    }

    #[test]
    fn totals_never_count_twice() {
        let start = Instant::now();
        let mut reporter = ProgressReporter::new();
        reporter.start(start);
        let mut sink = Vec::new();
        reporter.observe(500, start, &mut sink).expect("write");
        reporter.observe(500, start, &mut sink).expect("write");
        reporter.observe(400, start, &mut sink).expect("write");

        let mut out = Vec::new();
        reporter
            .finish(1_000, start + Duration::from_secs(1), &mut out)
            .expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "1000.0 B/s\n");
    }

    #[test]
    fn idle_meter_reports_zero() {
        assert_eq!(format_rate(0.0), "0.0 B/s");
    }
}
