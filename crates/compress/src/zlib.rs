//! # Overview
//!
//! zlib backend for the [`CodecEngine`](crate::CodecEngine) together with the
//! compression level vocabulary shared by every backend. The backend wraps
//! [`flate2`]'s low-level [`Compress`]/[`Decompress`] state machines, which
//! already expose the resumable byte-in/byte-out contract the engine needs:
//! each call reports how much input it consumed and how much output it
//! produced via the running `total_in`/`total_out` counters.
//!
//! # Examples
//!
//! Map a 0-100 quality onto a zlib level:
//!
//! ```
//! use compress::zlib::CompressionLevel;
//! use std::num::NonZeroU8;
//!
//! let level = CompressionLevel::from_quality(95).unwrap();
//! assert_eq!(level, CompressionLevel::Precise(NonZeroU8::new(9).unwrap()));
//! assert_eq!(CompressionLevel::from_quality(0).unwrap(), CompressionLevel::Store);
//! ```

use std::{fmt, num::NonZeroU8};

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};
use tracing::debug;

use crate::engine::{Outcome, Progress};
use crate::error::CodecError;

/// Highest quality accepted by [`CompressionLevel::from_quality`].
pub const MAX_QUALITY: u8 = 100;

/// Compression levels recognised by the encoders.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionLevel {
    /// Emit stored (uncompressed) blocks.
    Store,
    /// Favour speed over compression ratio.
    Fast,
    /// Use zlib's default balance between speed and ratio.
    Default,
    /// Favour the best possible compression ratio.
    Best,
    /// Use an explicit zlib compression level in the range `1..=9`.
    Precise(NonZeroU8),
}

impl CompressionLevel {
    /// Creates a [`CompressionLevel::Precise`] value from an explicit numeric level.
    ///
    /// The supplied `level` must fall within the inclusive range `1..=9`.
    /// `0` is rejected here; callers that want stored blocks use
    /// [`CompressionLevel::Store`] or [`CompressionLevel::from_quality`].
    pub fn from_numeric(level: u32) -> Result<Self, CompressionLevelError> {
        match u8::try_from(level).ok().and_then(NonZeroU8::new) {
            Some(precise) if level <= 9 => Ok(Self::Precise(precise)),
            _ => Err(CompressionLevelError::new(level, 1, 9)),
        }
    }

    /// Maps a quality in `0..=100` onto zlib's native `0..=9` range.
    ///
    /// Quality is scaled and rounded to the nearest level, so `95` and `100`
    /// both select level 9 while `0` selects stored blocks.
    pub fn from_quality(quality: u8) -> Result<Self, CompressionLevelError> {
        if quality > MAX_QUALITY {
            return Err(CompressionLevelError::new(
                u32::from(quality),
                0,
                u32::from(MAX_QUALITY),
            ));
        }

        let level = (u32::from(quality) * 9 + 50) / 100;
        match NonZeroU8::new(level as u8) {
            Some(precise) => Ok(Self::Precise(precise)),
            None => Ok(Self::Store),
        }
    }

    /// Constructs a [`CompressionLevel::Precise`] variant from the provided zlib level.
    #[must_use]
    pub const fn precise(level: NonZeroU8) -> Self {
        Self::Precise(level)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::Default
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Store => Compression::none(),
            CompressionLevel::Fast => Compression::fast(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Best => Compression::best(),
            CompressionLevel::Precise(value) => Compression::new(u32::from(value.get())),
        }
    }
}

/// Error returned when a requested compression level or quality falls outside
/// the permissible range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompressionLevelError {
    value: u32,
    min: u32,
    max: u32,
}

impl CompressionLevelError {
    const fn new(value: u32, min: u32, max: u32) -> Self {
        Self { value, min, max }
    }

    /// Returns the rejected value.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.value
    }
}

impl fmt::Display for CompressionLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compression level {} is outside the supported range {}-{}",
            self.value, self.min, self.max
        )
    }
}

impl std::error::Error for CompressionLevelError {}

/// Resumable deflate state producing a zlib stream.
pub(crate) struct Deflater {
    inner: Compress,
}

impl Deflater {
    pub(crate) fn new(level: CompressionLevel) -> Self {
        Self {
            inner: Compress::new(level.into(), true),
        }
    }

    pub(crate) fn step(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Progress {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let flush = if finish {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };

        let result = self.inner.compress(input, output, flush);
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;

        let outcome = match result {
            Ok(flate2::Status::StreamEnd) => Outcome::Ended,
            Ok(flate2::Status::Ok | flate2::Status::BufError) => Outcome::Open,
            Err(error) => {
                debug!(target: "compress::zlib", %error, "deflate rejected input");
                Outcome::Failed(CodecError::Backend)
            }
        };

        Progress {
            consumed,
            produced,
            outcome,
        }
    }
}

/// Resumable inflate state consuming a zlib stream.
pub(crate) struct Inflater {
    inner: Decompress,
}

impl Inflater {
    pub(crate) fn new() -> Self {
        Self {
            inner: Decompress::new(true),
        }
    }

    pub(crate) fn step(&mut self, input: &[u8], output: &mut [u8]) -> Progress {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        // The zlib trailer marks the end of the stream, so inflation never needs
        // a finishing flush; end-of-input without it is detected by the engine.
        let result = self.inner.decompress(input, output, FlushDecompress::None);
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;

        let outcome = match result {
            Ok(flate2::Status::StreamEnd) => Outcome::Ended,
            Ok(flate2::Status::Ok | flate2::Status::BufError) => Outcome::Open,
            Err(error) => {
                debug!(target: "compress::zlib", %error, "inflate rejected input");
                Outcome::Failed(CodecError::CorruptStream)
            }
        };

        Progress {
            consumed,
            produced,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precise_level_converts_to_requested_value() {
        let level = NonZeroU8::new(7).expect("non-zero");
        let compression = Compression::from(CompressionLevel::precise(level));
        assert_eq!(compression.level(), u32::from(level.get()));
    }

    #[test]
    fn store_level_disables_compression() {
        assert_eq!(Compression::from(CompressionLevel::Store).level(), 0);
    }

    #[test]
    fn numeric_level_constructor_accepts_valid_range() {
        for level in 1..=9 {
            let precise = CompressionLevel::from_numeric(level).expect("valid level");
            let expected = NonZeroU8::new(level as u8).expect("validated");
            assert_eq!(precise, CompressionLevel::Precise(expected));
        }
    }

    #[test]
    fn numeric_level_constructor_rejects_out_of_range() {
        let err = CompressionLevel::from_numeric(10).expect_err("level above 9 rejected");
        assert_eq!(err.level(), 10);
        assert!(CompressionLevel::from_numeric(0).is_err());
        assert!(CompressionLevel::from_numeric(300).is_err());
    }

    #[test]
    fn quality_maps_onto_zlib_range() {
        let level = |q| match CompressionLevel::from_quality(q).expect("valid quality") {
            CompressionLevel::Store => 0,
            CompressionLevel::Precise(n) => n.get(),
            other => panic!("unexpected level {other:?}"),
        };
        assert_eq!(level(0), 0);
        assert_eq!(level(5), 0);
        assert_eq!(level(6), 1);
        assert_eq!(level(50), 5);
        assert_eq!(level(95), 9);
        assert_eq!(level(100), 9);
    }

    #[test]
    fn quality_above_hundred_rejected() {
        let err = CompressionLevel::from_quality(101).expect_err("quality above 100");
        assert_eq!(err.level(), 101);
        assert!(err.to_string().contains("0-100"));
    }

    #[test]
    fn deflater_reports_consumed_and_produced() {
        let mut deflater = Deflater::new(CompressionLevel::Default);
        let mut out = [0u8; 128];
        let step = deflater.step(b"payload", &mut out, true);
        assert_eq!(step.consumed, 7);
        assert!(step.produced > 0);
        assert_eq!(step.outcome, Outcome::Ended);
    }

    #[test]
    fn inflater_flags_garbage_as_corrupt() {
        let mut inflater = Inflater::new();
        let mut out = [0u8; 64];
        let step = inflater.step(b"\xff\xff\xff\xff not zlib", &mut out);
        assert_eq!(step.outcome, Outcome::Failed(CodecError::CorruptStream));
    }
}
