use thiserror::Error;

/// Reasons a [`CodecEngine`](crate::CodecEngine) stopped.
///
/// Every variant is terminal for the engine that reported it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error)]
pub enum CodecError {
    /// The encoded input is malformed.
    #[error("compressed stream is corrupt")]
    CorruptStream,
    /// Input ended before the format's end-of-stream marker.
    #[error("compressed stream ended unexpectedly")]
    UnexpectedEnd,
    /// A call neither consumed nor produced bytes.
    #[error("codec made no progress")]
    NoProgress,
    /// The caller supplied an unusable argument, such as an empty output slice.
    #[error("invalid argument passed to codec")]
    InvalidArgument,
    /// `transform` was called after the stream finished.
    #[error("codec already finished")]
    AlreadyFinished,
    /// The underlying compression library failed for a reason unrelated to the data.
    #[error("compression backend failure")]
    Backend,
}

impl CodecError {
    /// Returns `true` for errors that indicate a caller contract violation
    /// rather than bad input data.
    #[must_use]
    pub const fn is_contract_violation(self) -> bool {
        matches!(
            self,
            Self::NoProgress | Self::InvalidArgument | Self::AlreadyFinished
        )
    }
}
