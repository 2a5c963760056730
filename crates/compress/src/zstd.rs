//! Zstandard backend built on the raw streaming API of the `zstd` crate.
//!
//! The raw `Operation` interface mirrors zlib's resumable contract: each call
//! advances an input cursor and an output cursor, so the engine can reuse the
//! same accounting for both formats.

use tracing::debug;
use zstd::stream::raw::{Decoder, Encoder, InBuffer, Operation, OutBuffer};

use crate::engine::{Outcome, Progress};
use crate::error::CodecError;
use crate::zlib::CompressionLevel;

pub(crate) struct ZstdEncoder {
    inner: Encoder<'static>,
}

impl ZstdEncoder {
    pub(crate) fn new(level: CompressionLevel) -> Result<Self, CodecError> {
        let inner = Encoder::new(zstd_level(level)).map_err(|error| {
            debug!(target: "compress::zstd", %error, "failed to allocate encoder");
            CodecError::Backend
        })?;
        Ok(Self { inner })
    }

    pub(crate) fn step(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Progress {
        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);

        let mut outcome = Outcome::Open;
        if !input.is_empty() {
            if let Err(error) = self.inner.run(&mut src, &mut dst) {
                debug!(target: "compress::zstd", %error, "encoder rejected input");
                outcome = Outcome::Failed(CodecError::Backend);
            }
        }

        // The epilogue may only start once every input byte has been handed over.
        if finish && outcome == Outcome::Open && src.pos() == input.len() {
            match self.inner.finish(&mut dst, true) {
                Ok(0) => outcome = Outcome::Ended,
                Ok(_) => {}
                Err(error) => {
                    debug!(target: "compress::zstd", %error, "encoder failed to finish frame");
                    outcome = Outcome::Failed(CodecError::Backend);
                }
            }
        }

        Progress {
            consumed: src.pos(),
            produced: dst.pos(),
            outcome,
        }
    }
}

pub(crate) struct ZstdDecoder {
    inner: Decoder<'static>,
}

impl ZstdDecoder {
    pub(crate) fn new() -> Result<Self, CodecError> {
        let inner = Decoder::new().map_err(|error| {
            debug!(target: "compress::zstd", %error, "failed to allocate decoder");
            CodecError::Backend
        })?;
        Ok(Self { inner })
    }

    pub(crate) fn step(&mut self, input: &[u8], output: &mut [u8]) -> Progress {
        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);

        let outcome = match self.inner.run(&mut src, &mut dst) {
            // A zero hint means the frame is fully decoded and flushed.
            Ok(0) => Outcome::Ended,
            Ok(_) => Outcome::Open,
            Err(error) => {
                debug!(target: "compress::zstd", %error, "decoder rejected input");
                Outcome::Failed(CodecError::CorruptStream)
            }
        };

        Progress {
            consumed: src.pos(),
            produced: dst.pos(),
            outcome,
        }
    }
}

fn zstd_level(level: CompressionLevel) -> i32 {
    match level {
        CompressionLevel::Store | CompressionLevel::Fast => 1,
        CompressionLevel::Default => 3,
        CompressionLevel::Best => 19,
        CompressionLevel::Precise(value) => i32::from(value.get()),
    }
}
