use std::io;

use thiserror::Error;

/// Reasons [`TransferSession::connect`](crate::TransferSession::connect)
/// can fail. The session stays idle and the call may be retried.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConnectError {
    /// The address could not be resolved or no route reached it.
    #[error("{address} is unreachable: {detail}")]
    Unreachable {
        /// Address that was attempted.
        address: String,
        /// Underlying failure.
        detail: String,
    },
    /// The peer actively refused the connection.
    #[error("connection to {address} refused")]
    Refused {
        /// Address that was attempted.
        address: String,
    },
    /// The connection attempt did not complete in time.
    #[error("connection to {address} timed out")]
    Timeout {
        /// Address that was attempted.
        address: String,
    },
    /// `connect` was called while the session was not idle.
    #[error("session is not idle")]
    InvalidState,
}

impl ConnectError {
    /// Classifies an I/O error raised while connecting to `address`.
    pub fn from_io(address: impl Into<String>, error: &io::Error) -> Self {
        let address = address.into();
        match error.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused { address },
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout { address },
            _ => Self::Unreachable {
                address,
                detail: error.to_string(),
            },
        }
    }
}

/// Reasons a resource request is rejected before any response arrives.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RequestError {
    /// The named resource does not exist.
    #[error("resource '{name}' not found")]
    NotFound {
        /// Requested name.
        name: String,
    },
    /// The request cannot be expressed on the wire.
    #[error("protocol error: {0}")]
    ProtocolError(String),
    /// The resource exists but could not be opened.
    #[error("cannot open '{name}': {detail}")]
    Unreadable {
        /// Requested name.
        name: String,
        /// Underlying failure.
        detail: String,
    },
    /// `request` was called outside the `Connecting` state.
    #[error("session is not ready for a request")]
    InvalidState,
}

/// Terminal failure reported through
/// [`TransferEvent::Failed`](crate::TransferEvent::Failed).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FailureReason {
    /// The peer reported that the resource does not exist.
    #[error("resource not found (status {status})")]
    NotFound {
        /// Status code carried by the response.
        status: u16,
    },
    /// The response was malformed or not a success.
    #[error("protocol error: {0}")]
    ProtocolError(String),
    /// The stream ended before the expected length arrived.
    #[error("stream ended after {received} of {expected} bytes")]
    Truncated {
        /// Declared length.
        expected: u64,
        /// Bytes delivered before the end of stream.
        received: u64,
    },
    /// The transfer was cancelled or the session disconnected.
    #[error("transfer cancelled")]
    Cancelled,
    /// The channel failed.
    #[error("connection lost: {message}")]
    Channel {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Rendered I/O error.
        message: String,
    },
    /// Reading a local resource failed.
    #[error("read error: {message}")]
    LocalRead {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Rendered I/O error.
        message: String,
    },
}

impl FailureReason {
    pub(crate) fn protocol(detail: impl Into<String>) -> Self {
        Self::ProtocolError(detail.into())
    }

    pub(crate) fn local_read(error: &io::Error) -> Self {
        Self::LocalRead {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<ConnectError> for FailureReason {
    fn from(error: ConnectError) -> Self {
        let kind = match &error {
            ConnectError::Refused { .. } => io::ErrorKind::ConnectionRefused,
            ConnectError::Timeout { .. } => io::ErrorKind::TimedOut,
            ConnectError::Unreachable { .. } => io::ErrorKind::HostUnreachable,
            ConnectError::InvalidState => io::ErrorKind::Other,
        };
        Self::Channel {
            kind,
            message: error.to_string(),
        }
    }
}

impl From<io::Error> for FailureReason {
    fn from(error: io::Error) -> Self {
        Self::Channel {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
