//! The resumable [`CodecEngine`] and the [`Transform`] contract it implements.

use tracing::debug;

use crate::algorithm::CompressionAlgorithm;
use crate::error::CodecError;
use crate::zlib::{CompressionLevel, CompressionLevelError, Deflater, Inflater};
#[cfg(feature = "zstd")]
use crate::zstd::{ZstdDecoder, ZstdEncoder};

/// Direction of an engine. Fixed for the engine's lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Plain bytes in, encoded bytes out.
    Compress,
    /// Encoded bytes in, plain bytes out.
    Decompress,
}

impl Mode {
    /// Returns a lowercase name suitable for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
        }
    }
}

/// Construction parameters for a [`CodecEngine`].
///
/// The level only matters for [`Mode::Compress`]; decoders read everything
/// they need from the stream itself.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EngineParams {
    algorithm: CompressionAlgorithm,
    level: CompressionLevel,
}

impl EngineParams {
    /// Parameters for `algorithm` at its default level.
    #[must_use]
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            level: CompressionLevel::Default,
        }
    }

    /// Replaces the level with one derived from a `0..=100` quality.
    pub fn with_quality(self, quality: u8) -> Result<Self, CompressionLevelError> {
        Ok(self.with_level(CompressionLevel::from_quality(quality)?))
    }

    /// Replaces the compression level.
    #[must_use]
    pub const fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Replaces the algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Returns the configured compression level.
    #[must_use]
    pub const fn level(&self) -> CompressionLevel {
        self.level
    }
}

/// What the caller should do after a [`Transform::transform`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The call made progress; supply more input (or the finish hint).
    Continue,
    /// The output slice filled up; flush it and call again with the remaining input.
    NeedMoreOutputSpace,
    /// End of stream reached and every output byte handed to the caller.
    Finished,
    /// The engine failed and must not be called again.
    Error(CodecError),
}

/// Outcome of a single [`Transform::transform`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StepResult {
    /// Bytes taken from the front of `input`.
    pub consumed: usize,
    /// Bytes written to the front of `output`.
    pub produced: usize,
    /// Next action for the caller.
    pub status: Status,
}

impl StepResult {
    /// A result that moved no bytes and reports `error`.
    #[must_use]
    pub const fn rejected(error: CodecError) -> Self {
        Self {
            consumed: 0,
            produced: 0,
            status: Status::Error(error),
        }
    }

    /// Returns `true` when the call consumed or produced at least one byte.
    #[must_use]
    pub const fn made_progress(&self) -> bool {
        self.consumed > 0 || self.produced > 0
    }
}

/// The incremental byte-in/byte-out contract driven by the buffer pump.
///
/// Implementations must respect `consumed <= input.len()` and
/// `produced <= output.len()`, and must make progress on every call that does
/// not end in [`Status::Finished`] or [`Status::Error`]. Callers treat a
/// progress-free `Continue` as a defect.
pub trait Transform {
    /// Feeds `input`, writing into `output`. `finish_hint` promises that no
    /// input beyond `input` will ever arrive.
    fn transform(&mut self, input: &[u8], output: &mut [u8], finish_hint: bool) -> StepResult;

    /// Cumulative bytes consumed.
    fn total_in(&self) -> u64;

    /// Cumulative bytes produced.
    fn total_out(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Outcome {
    Open,
    Ended,
    Failed(CodecError),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Progress {
    pub(crate) consumed: usize,
    pub(crate) produced: usize,
    pub(crate) outcome: Outcome,
}

enum Backend {
    Deflate(Deflater),
    Inflate(Inflater),
    #[cfg(feature = "zstd")]
    ZstdEncode(Box<ZstdEncoder>),
    #[cfg(feature = "zstd")]
    ZstdDecode(Box<ZstdDecoder>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EngineState {
    Ready,
    Finished,
    Failed(CodecError),
}

/// Resumable compressor or decompressor.
///
/// One engine handles exactly one stream in one direction. It keeps its own
/// working state between calls, so the caller only ever deals with bounded
/// input and output slices.
pub struct CodecEngine {
    backend: Backend,
    algorithm: CompressionAlgorithm,
    total_in: u64,
    total_out: u64,
    state: EngineState,
}

impl CodecEngine {
    /// Creates an engine for `mode` using `params`.
    ///
    /// Only the Zstandard backend can fail here (context allocation).
    pub fn new(mode: Mode, params: EngineParams) -> Result<Self, CodecError> {
        let backend = match (mode, params.algorithm()) {
            (Mode::Compress, CompressionAlgorithm::Zlib) => {
                Backend::Deflate(Deflater::new(params.level()))
            }
            (Mode::Decompress, CompressionAlgorithm::Zlib) => Backend::Inflate(Inflater::new()),
            #[cfg(feature = "zstd")]
            (Mode::Compress, CompressionAlgorithm::Zstd) => {
                Backend::ZstdEncode(Box::new(ZstdEncoder::new(params.level())?))
            }
            #[cfg(feature = "zstd")]
            (Mode::Decompress, CompressionAlgorithm::Zstd) => {
                Backend::ZstdDecode(Box::new(ZstdDecoder::new()?))
            }
        };

        debug!(
            target: "compress::engine",
            mode = mode.name(),
            algorithm = params.algorithm().name(),
            level = ?params.level(),
            "created codec engine"
        );

        Ok(Self {
            backend,
            algorithm: params.algorithm(),
            total_in: 0,
            total_out: 0,
            state: EngineState::Ready,
        })
    }

    /// Returns the direction this engine was built for.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self.backend {
            Backend::Deflate(_) => Mode::Compress,
            Backend::Inflate(_) => Mode::Decompress,
            #[cfg(feature = "zstd")]
            Backend::ZstdEncode(_) => Mode::Compress,
            #[cfg(feature = "zstd")]
            Backend::ZstdDecode(_) => Mode::Decompress,
        }
    }

    /// Returns the stream format.
    #[must_use]
    pub const fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Cumulative bytes consumed across every call.
    #[must_use]
    pub const fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Cumulative bytes produced across every call.
    #[must_use]
    pub const fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Returns `true` once the stream has ended and all output was handed over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == EngineState::Finished
    }

    /// Advances the stream. See [`Transform`] for the contract.
    pub fn transform(&mut self, input: &[u8], output: &mut [u8], finish_hint: bool) -> StepResult {
        match self.state {
            EngineState::Finished => return StepResult::rejected(CodecError::AlreadyFinished),
            EngineState::Failed(error) => return StepResult::rejected(error),
            EngineState::Ready => {}
        }

        if output.is_empty() {
            return self.fail(CodecError::InvalidArgument, 0, 0);
        }

        let progress = match &mut self.backend {
            Backend::Deflate(deflater) => deflater.step(input, output, finish_hint),
            Backend::Inflate(inflater) => inflater.step(input, output),
            #[cfg(feature = "zstd")]
            Backend::ZstdEncode(encoder) => encoder.step(input, output, finish_hint),
            #[cfg(feature = "zstd")]
            Backend::ZstdDecode(decoder) => decoder.step(input, output),
        };

        let Progress {
            consumed,
            produced,
            outcome,
        } = progress;

        match outcome {
            Outcome::Failed(error) => self.fail(error, consumed, produced),
            Outcome::Ended => {
                self.account(consumed, produced);
                self.state = EngineState::Finished;
                debug!(
                    target: "compress::engine",
                    total_in = self.total_in,
                    total_out = self.total_out,
                    "stream finished"
                );
                StepResult {
                    consumed,
                    produced,
                    status: Status::Finished,
                }
            }
            Outcome::Open if produced == output.len() => {
                self.account(consumed, produced);
                StepResult {
                    consumed,
                    produced,
                    status: Status::NeedMoreOutputSpace,
                }
            }
            Outcome::Open
                if finish_hint
                    && input.is_empty()
                    && consumed == 0
                    && produced == 0
                    && self.mode() == Mode::Decompress =>
            {
                self.fail(CodecError::UnexpectedEnd, 0, 0)
            }
            Outcome::Open => {
                self.account(consumed, produced);
                StepResult {
                    consumed,
                    produced,
                    status: Status::Continue,
                }
            }
        }
    }

    fn account(&mut self, consumed: usize, produced: usize) {
        self.total_in = self.total_in.saturating_add(consumed as u64);
        self.total_out = self.total_out.saturating_add(produced as u64);
    }

    fn fail(&mut self, error: CodecError, consumed: usize, produced: usize) -> StepResult {
        self.account(consumed, produced);
        self.state = EngineState::Failed(error);
        debug!(
            target: "compress::engine",
            %error,
            total_in = self.total_in,
            total_out = self.total_out,
            "codec engine failed"
        );
        StepResult {
            consumed,
            produced,
            status: Status::Error(error),
        }
    }
}

impl Transform for CodecEngine {
    fn transform(&mut self, input: &[u8], output: &mut [u8], finish_hint: bool) -> StepResult {
        Self::transform(self, input, output, finish_hint)
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }
}

impl std::fmt::Debug for CodecEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecEngine")
            .field("mode", &self.mode())
            .field("algorithm", &self.algorithm)
            .field("total_in", &self.total_in)
            .field("total_out", &self.total_out)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
