//! Error categorization for pumped transfers.
//!
//! Every failure the pipeline can report is a [`TransferError`]. The
//! [`FailureClass`] returned by [`TransferError::class`] groups them the way a
//! front end reports them: connection problems, protocol problems, codec
//! problems, local I/O problems and bad invocations.

use std::io;

use compress::CodecError;
use thiserror::Error;
use transport::{ConnectError, FailureReason, RequestError};

/// Broad family of a [`TransferError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FailureClass {
    /// The connection could not be established, was lost, or was cancelled.
    Connection,
    /// The peer rejected the request or answered with something unusable.
    Protocol,
    /// The compressed stream was corrupt or the engine misbehaved.
    Codec,
    /// The destination could not be written or a local resource could not be read.
    Io,
    /// The transfer was configured with values it cannot run with.
    Usage,
}

impl FailureClass {
    /// Short lowercase label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Codec => "codec",
            Self::Io => "io",
            Self::Usage => "usage",
        }
    }
}

/// Failure of a pumped transfer.
///
/// All variants are cheap to clone so the pump can repeat a terminal
/// failure on every later step.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TransferError {
    /// Establishing the connection failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The request was rejected before any response arrived.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The source failed after the request was sent.
    #[error(transparent)]
    Source(FailureReason),

    /// The transfer was cancelled or the source disconnected.
    #[error("transfer cancelled")]
    Cancelled,

    /// The resource turned out to contain no bytes.
    #[error("resource is empty")]
    EmptyResource,

    /// The codec engine failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Writing to the destination failed.
    #[error("cannot write destination: {message}")]
    Destination {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Rendered I/O error.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TransferError {
    /// Returns the family this error belongs to.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Connect(_) | Self::Cancelled => FailureClass::Connection,
            Self::Source(reason) => match reason {
                FailureReason::NotFound { .. } | FailureReason::ProtocolError(_) => {
                    FailureClass::Protocol
                }
                FailureReason::Truncated { .. }
                | FailureReason::Cancelled
                | FailureReason::Channel { .. } => FailureClass::Connection,
                FailureReason::LocalRead { .. } => FailureClass::Io,
            },
            Self::Request(error) => match error {
                RequestError::Unreadable { .. } => FailureClass::Io,
                RequestError::NotFound { .. }
                | RequestError::ProtocolError(_)
                | RequestError::InvalidState => FailureClass::Protocol,
            },
            Self::EmptyResource => FailureClass::Protocol,
            Self::Codec(_) => FailureClass::Codec,
            Self::Destination { .. } => FailureClass::Io,
            Self::Config(_) => FailureClass::Usage,
        }
    }

    /// Short label naming the kind of failure, for `transfer: <kind>: <detail>`
    /// diagnostics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Connect(ConnectError::Refused { .. }) => "connection refused",
            Self::Connect(ConnectError::Timeout { .. }) => "connection timed out",
            Self::Connect(_) => "connection failed",
            Self::Request(RequestError::NotFound { .. })
            | Self::Source(FailureReason::NotFound { .. }) => "not found",
            Self::Request(RequestError::Unreadable { .. }) => "unreadable resource",
            Self::Request(_) | Self::Source(FailureReason::ProtocolError(_)) => "protocol error",
            Self::Source(FailureReason::Truncated { .. }) => "truncated",
            Self::Source(FailureReason::Channel { .. }) => "connection lost",
            Self::Source(FailureReason::LocalRead { .. }) => "read error",
            Self::Source(FailureReason::Cancelled) | Self::Cancelled => "cancelled",
            Self::EmptyResource => "empty resource",
            Self::Codec(CodecError::CorruptStream) => "corrupt stream",
            Self::Codec(CodecError::UnexpectedEnd) => "unexpected end",
            Self::Codec(_) => "codec error",
            Self::Destination { .. } => "write error",
            Self::Config(_) => "usage",
        }
    }
}

impl From<FailureReason> for TransferError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Cancelled => Self::Cancelled,
            other => Self::Source(other),
        }
    }
}

impl From<io::Error> for TransferError {
    fn from(error: io::Error) -> Self {
        Self::Destination {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
