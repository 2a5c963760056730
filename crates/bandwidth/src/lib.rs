//! Rate accounting and pacing for streaming transfers.
//!
//! The crate groups three small pieces that the transport session and the
//! command-line front end share:
//!
//! - [`RateMeter`] accumulates delivered bytes against an elapsed-time
//!   window and reports bytes per second. Every session owns its own meter;
//!   nothing here is process-wide.
//! - [`BandwidthLimiter`] is a token bucket that never sleeps. Callers ask
//!   for an [`allowance`](BandwidthLimiter::allowance) before reading and
//!   [`register`](BandwidthLimiter::register) what they actually moved, so
//!   throttling fits a cooperative poll loop.
//! - [`parse_bandwidth_argument`] and [`parse_bandwidth_limit`] accept the
//!   familiar `--bwlimit` syntax (`512K`, `1.5M`, `10MB`, `0` for unlimited,
//!   `RATE:BURST`).
//!
//! Time is read through the [`Clock`] trait so tests can drive the meter and
//! limiter with a manual clock.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use bandwidth::RateMeter;
//!
//! let start = Instant::now();
//! let mut meter = RateMeter::new();
//! meter.start(start);
//! meter.record(1_000_000);
//! let rate = meter.bytes_per_second(start + Duration::from_secs(2));
//! assert_eq!(rate, 500_000.0);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod clock;
mod limiter;
mod meter;
mod parse;

pub use crate::clock::{Clock, SystemClock};
pub use crate::limiter::BandwidthLimiter;
pub use crate::meter::RateMeter;
pub use crate::parse::{
    BandwidthLimitComponents, BandwidthParseError, parse_bandwidth_argument, parse_bandwidth_limit,
};
