use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::channel::{ByteChannel, FileChannel};
use crate::error::{FailureReason, RequestError};

/// Result of a single non-blocking poll.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferEvent {
    /// Nothing is available right now.
    WouldBlock,
    /// `n` bytes of the resource body were placed at the front of the buffer.
    DataAvailable(usize),
    /// The whole resource has been delivered.
    Complete,
    /// The transfer stopped; the reason is terminal.
    Failed(FailureReason),
}

/// Anything that yields resource bytes through non-blocking polls.
pub trait TransferSource {
    /// Moves up to `buf.len()` bytes of the resource into `buf`.
    fn poll(&mut self, buf: &mut [u8]) -> TransferEvent;

    /// Declared total length, when known.
    fn expected_length(&self) -> Option<u64>;

    /// Stops the transfer. The next poll reports
    /// [`FailureReason::Cancelled`].
    fn cancel(&mut self);

    /// Returns `true` after [`cancel`](Self::cancel).
    fn is_cancelled(&self) -> bool;

    /// Closes the underlying channel once the consumer needs no more bytes.
    ///
    /// Unlike [`cancel`](Self::cancel) this is not a failure; the source only
    /// stops delivering.
    fn release(&mut self) {}
}

impl<S: TransferSource + ?Sized> TransferSource for &mut S {
    fn poll(&mut self, buf: &mut [u8]) -> TransferEvent {
        (**self).poll(buf)
    }

    fn expected_length(&self) -> Option<u64> {
        (**self).expected_length()
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn release(&mut self) {
        (**self).release();
    }
}

impl<S: TransferSource + ?Sized> TransferSource for Box<S> {
    fn poll(&mut self, buf: &mut [u8]) -> TransferEvent {
        (**self).poll(buf)
    }

    fn expected_length(&self) -> Option<u64> {
        (**self).expected_length()
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn release(&mut self) {
        (**self).release();
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SourceState {
    Open,
    Complete,
    Failed(FailureReason),
}

/// [`TransferSource`] over a bare [`ByteChannel`] with no request framing.
///
/// The resource is everything the channel yields until end of stream.
#[derive(Debug)]
pub struct ChannelSource<C> {
    channel: Option<C>,
    expected: Option<u64>,
    received: u64,
    state: SourceState,
    cancelled: bool,
}

impl<C: ByteChannel> ChannelSource<C> {
    /// Reads `channel` until end of stream.
    pub const fn new(channel: C) -> Self {
        Self {
            channel: Some(channel),
            expected: None,
            received: 0,
            state: SourceState::Open,
            cancelled: false,
        }
    }

    /// Declares how many bytes the channel should yield; ending early is
    /// reported as [`FailureReason::Truncated`] and extra bytes are ignored.
    #[must_use]
    pub const fn with_expected_length(mut self, length: u64) -> Self {
        self.expected = Some(length);
        self
    }

    /// Bytes delivered so far.
    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        self.received
    }

    fn finish(&mut self, state: SourceState) -> TransferEvent {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        let event = match &state {
            SourceState::Complete => TransferEvent::Complete,
            SourceState::Failed(reason) => TransferEvent::Failed(reason.clone()),
            SourceState::Open => TransferEvent::WouldBlock,
        };
        self.state = state;
        event
    }
}

impl ChannelSource<FileChannel> {
    /// Opens a local file as a source whose expected length is the file size.
    pub fn open_file(path: &Path) -> Result<Self, RequestError> {
        let name = path.display().to_string();
        let channel = FileChannel::open(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => RequestError::NotFound { name: name.clone() },
            _ => RequestError::Unreadable {
                name: name.clone(),
                detail: error.to_string(),
            },
        })?;
        let length = channel.known_len();
        let source = Self::new(channel);
        Ok(match length {
            Some(length) => source.with_expected_length(length),
            None => source,
        })
    }
}

impl<C: ByteChannel> TransferSource for ChannelSource<C> {
    fn poll(&mut self, buf: &mut [u8]) -> TransferEvent {
        if self.cancelled {
            return TransferEvent::Failed(FailureReason::Cancelled);
        }
        match &self.state {
            SourceState::Complete => return TransferEvent::Complete,
            SourceState::Failed(reason) => return TransferEvent::Failed(reason.clone()),
            SourceState::Open => {}
        }

        if let Some(expected) = self.expected {
            if self.received >= expected {
                return self.finish(SourceState::Complete);
            }
        }

        let remaining = self
            .expected
            .map_or(usize::MAX, |expected| {
                usize::try_from(expected - self.received).unwrap_or(usize::MAX)
            });
        let budget = buf.len().min(remaining);
        if budget == 0 {
            return TransferEvent::WouldBlock;
        }

        let Some(channel) = self.channel.as_mut() else {
            return self.finish(SourceState::Failed(FailureReason::Cancelled));
        };
        match channel.try_read(&mut buf[..budget]) {
            Ok(0) => match self.expected {
                Some(expected) if self.received < expected => {
                    warn!(expected, received = self.received, "source ended early");
                    self.finish(SourceState::Failed(FailureReason::Truncated {
                        expected,
                        received: self.received,
                    }))
                }
                _ => {
                    debug!(received = self.received, "source reached end of stream");
                    self.finish(SourceState::Complete)
                }
            },
            Ok(n) => {
                self.received += n as u64;
                TransferEvent::DataAvailable(n)
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => TransferEvent::WouldBlock,
            Err(error) => {
                warn!(%error, "source channel failed");
                let reason = if channel.is_local() {
                    FailureReason::local_read(&error)
                } else {
                    error.into()
                };
                self.finish(SourceState::Failed(reason))
            }
        }
    }

    fn expected_length(&self) -> Option<u64> {
        self.expected
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn release(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            debug!(received = self.received, "source released");
            channel.close();
        }
    }
}
