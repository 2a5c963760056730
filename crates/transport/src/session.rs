//! The per-resource connection state machine.

use std::fmt;
use std::io;

use bandwidth::{BandwidthLimiter, Clock, RateMeter, SystemClock};
use tracing::{debug, trace, warn};
use url::Url;

use crate::address::{Address, ResourceLocator};
use crate::channel::ByteChannel;
use crate::chunked::ChunkedDecoder;
use crate::connector::Connector;
use crate::error::{ConnectError, FailureReason, RequestError};
use crate::request::ResourceRequest;
use crate::response::{MAX_HEADER_LEN, StatusAction, check_status, find_head_end, parse_head};
use crate::source::{TransferEvent, TransferSource};

const HEADER_READ_CHUNK: usize = 4096;

/// Redirects a session follows before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Lifecycle of a [`TransferSession`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    /// No channel.
    Idle,
    /// Channel established; no request sent yet.
    Connecting,
    /// Request queued or sent; waiting for the response head.
    AwaitingResponse,
    /// Delivering body bytes.
    Transferring,
    /// Every body byte was delivered.
    Complete,
    /// The transfer stopped.
    Failed(FailureReason),
}

impl SessionStatus {
    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

/// Fetches one resource over a channel opened by a [`Connector`].
///
/// Every method returns immediately: `connect` establishes the channel,
/// `request` queues the request head, and each [`poll`](Self::poll) moves at
/// most one read's worth of bytes. Redirects are followed inside `poll` by
/// reconnecting through the same [`Connector`], up to [`MAX_REDIRECTS`].
pub struct TransferSession<N: Connector, K: Clock = SystemClock> {
    connector: N,
    clock: K,
    channel: Option<N::Channel>,
    address: Option<Address>,
    host_header: String,
    request: Option<ResourceRequest>,
    redirects: Vec<String>,
    chunked: Option<ChunkedDecoder>,
    status: SessionStatus,
    outgoing: Vec<u8>,
    outgoing_sent: usize,
    header: Vec<u8>,
    early_body: Vec<u8>,
    early_sent: usize,
    expected: Option<u64>,
    received: u64,
    meter: RateMeter,
    limiter: Option<BandwidthLimiter>,
    cancelled: bool,
}

impl<N: Connector> TransferSession<N> {
    /// Creates an idle session that measures time with [`SystemClock`].
    pub fn new(connector: N) -> Self {
        Self::with_clock(connector, SystemClock)
    }
}

impl<N: Connector, K: Clock> TransferSession<N, K> {
    /// Creates an idle session reading time from `clock`.
    pub fn with_clock(connector: N, clock: K) -> Self {
        Self {
            connector,
            clock,
            channel: None,
            address: None,
            host_header: String::new(),
            request: None,
            redirects: Vec::new(),
            chunked: None,
            status: SessionStatus::Idle,
            outgoing: Vec::new(),
            outgoing_sent: 0,
            header: Vec::new(),
            early_body: Vec::new(),
            early_sent: 0,
            expected: None,
            received: 0,
            meter: RateMeter::new(),
            limiter: None,
            cancelled: false,
        }
    }

    /// Caps delivery with `limiter`.
    #[must_use]
    pub fn with_limiter(mut self, limiter: BandwidthLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Replaces or removes the bandwidth limiter.
    pub fn set_limiter(&mut self, limiter: Option<BandwidthLimiter>) {
        self.limiter = limiter;
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Body bytes delivered since the last connect.
    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        self.received
    }

    /// Average delivery rate since the last connect.
    ///
    /// Frozen once the session completes or fails.
    #[must_use]
    pub fn bytes_per_second(&self) -> f64 {
        self.meter.bytes_per_second(self.clock.now())
    }

    /// Opens a channel to `address`.
    ///
    /// On failure the session stays [`Idle`](SessionStatus::Idle).
    pub fn connect(&mut self, address: &Address) -> Result<(), ConnectError> {
        if self.status != SessionStatus::Idle {
            return Err(ConnectError::InvalidState);
        }

        let channel = self.connector.connect(address).inspect_err(|error| {
            warn!(%address, %error, "connect failed");
        })?;
        debug!(%address, "connected");

        self.reset_transfer_state();
        self.channel = Some(channel);
        self.host_header = address.host_header();
        self.address = Some(address.clone());
        self.meter.start(self.clock.now());
        if let Some(limiter) = self.limiter.as_mut() {
            limiter.reset();
        }
        self.status = SessionStatus::Connecting;
        Ok(())
    }

    /// Queues the request for `resource` and starts sending it.
    pub fn request(&mut self, resource: &ResourceRequest) -> Result<(), RequestError> {
        if self.status != SessionStatus::Connecting {
            return Err(RequestError::InvalidState);
        }
        resource.validate()?;

        self.outgoing = resource.encode(&self.host_header);
        self.outgoing_sent = 0;
        self.expected = resource.expected_length();
        self.request = Some(resource.clone());
        self.status = SessionStatus::AwaitingResponse;
        debug!(name = resource.name(), expected = ?self.expected, "request queued");

        if let Err(reason) = self.flush_request() {
            self.fail(reason);
        }
        Ok(())
    }

    /// Moves available body bytes into `buf`.
    pub fn poll(&mut self, buf: &mut [u8]) -> TransferEvent {
        if self.cancelled {
            return TransferEvent::Failed(FailureReason::Cancelled);
        }

        match &self.status {
            SessionStatus::Idle => {
                return TransferEvent::Failed(FailureReason::Channel {
                    kind: io::ErrorKind::NotConnected,
                    message: "session is not connected".to_owned(),
                });
            }
            SessionStatus::Connecting => return TransferEvent::WouldBlock,
            SessionStatus::Complete => return TransferEvent::Complete,
            SessionStatus::Failed(reason) => return TransferEvent::Failed(reason.clone()),
            SessionStatus::AwaitingResponse | SessionStatus::Transferring => {}
        }

        if self.status == SessionStatus::AwaitingResponse {
            match self.await_response() {
                Ok(true) => {}
                Ok(false) => return TransferEvent::WouldBlock,
                Err(reason) => return self.fail(reason),
            }
        }

        self.deliver(buf)
    }

    /// Releases the channel from any state and returns to
    /// [`Idle`](SessionStatus::Idle). The next poll reports
    /// [`FailureReason::Cancelled`] until the session reconnects.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.meter.freeze(self.clock.now());
        if self.status != SessionStatus::Idle {
            debug!(received = self.received, "disconnected");
        }
        self.status = SessionStatus::Idle;
        self.cancelled = true;
    }

    fn reset_transfer_state(&mut self) {
        self.outgoing.clear();
        self.outgoing_sent = 0;
        self.header.clear();
        self.early_body.clear();
        self.early_sent = 0;
        self.expected = None;
        self.received = 0;
        self.request = None;
        self.redirects.clear();
        self.chunked = None;
        self.cancelled = false;
        self.meter.reset();
    }

    fn channel(&mut self) -> Result<&mut N::Channel, FailureReason> {
        self.channel.as_mut().ok_or(FailureReason::Cancelled)
    }

    /// Writes as much of the queued request as the channel accepts.
    fn flush_request(&mut self) -> Result<(), FailureReason> {
        while self.outgoing_sent < self.outgoing.len() {
            let pending = &self.outgoing[self.outgoing_sent..];
            let channel = self.channel.as_mut().ok_or(FailureReason::Cancelled)?;
            match channel.try_write(pending) {
                Ok(0) => {
                    return Err(FailureReason::Channel {
                        kind: io::ErrorKind::WriteZero,
                        message: "channel accepted no request bytes".to_owned(),
                    });
                }
                Ok(n) => {
                    self.outgoing_sent += n;
                    trace!(sent = self.outgoing_sent, total = self.outgoing.len(), "request bytes written");
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// Advances the request/response exchange. Returns `Ok(true)` once the
    /// response head has been accepted.
    fn await_response(&mut self) -> Result<bool, FailureReason> {
        self.flush_request()?;
        if self.outgoing_sent < self.outgoing.len() {
            return Ok(false);
        }

        let searched = self.header.len();
        let room = MAX_HEADER_LEN - searched;
        let mut scratch = [0u8; HEADER_READ_CHUNK];
        let want = room.min(scratch.len());
        let n = match self.channel()?.try_read(&mut scratch[..want]) {
            Ok(0) => {
                return Err(FailureReason::protocol(
                    "connection closed before the response head",
                ));
            }
            Ok(n) => n,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(error) => return Err(error.into()),
        };
        self.header.extend_from_slice(&scratch[..n]);

        let Some(head_len) = find_head_end(&self.header, searched) else {
            if self.header.len() >= MAX_HEADER_LEN {
                return Err(FailureReason::protocol(format!(
                    "response head exceeds {MAX_HEADER_LEN} bytes"
                )));
            }
            return Ok(false);
        };

        let head = parse_head(&self.header[..head_len])?;
        debug!(
            status = head.status,
            content_length = ?head.content_length,
            chunked = head.chunked,
            "response head received"
        );
        if check_status(head.status)? == StatusAction::Redirect {
            self.follow_redirect(head.status, head.location.as_deref())?;
            return Ok(false);
        }

        self.early_body = self.header.split_off(head_len);
        self.early_sent = 0;
        if head.chunked {
            // Framing decides the length; Content-Length is ignored.
            self.chunked = Some(ChunkedDecoder::new());
        } else {
            match (self.expected, head.content_length) {
                (Some(declared), Some(announced)) if declared != announced => {
                    return Err(FailureReason::protocol(format!(
                        "response announces {announced} bytes but {declared} were expected"
                    )));
                }
                (None, announced) => self.expected = announced,
                _ => {}
            }
            if let Some(expected) = self.expected {
                let limit = usize::try_from(expected).unwrap_or(usize::MAX);
                self.early_body.truncate(limit);
            }
        }
        self.header = Vec::new();
        self.status = SessionStatus::Transferring;
        Ok(true)
    }

    /// Reconnects to the target of a redirect and queues the request again.
    fn follow_redirect(&mut self, status: u16, location: Option<&str>) -> Result<(), FailureReason> {
        let location = location.ok_or_else(|| {
            FailureReason::protocol(format!("redirect status {status} without a Location header"))
        })?;
        let (Some(address), Some(request)) = (self.address.as_ref(), self.request.as_ref()) else {
            return Err(FailureReason::Cancelled);
        };

        let current = format!("http://{}{}", address.host_header(), request.target());
        let target = Url::parse(&current)
            .and_then(|base| base.join(location))
            .map_err(|error| {
                FailureReason::protocol(format!("invalid redirect location '{location}': {error}"))
            })?;
        let target = target.to_string();
        if self.redirects.iter().any(|visited| *visited == target) {
            return Err(FailureReason::protocol(format!("redirect cycle at {target}")));
        }
        if self.redirects.len() >= MAX_REDIRECTS {
            return Err(FailureReason::protocol(format!(
                "more than {MAX_REDIRECTS} redirects"
            )));
        }
        let ResourceLocator::Remote { address, path } = ResourceLocator::parse(&target)
            .map_err(|error| {
                FailureReason::protocol(format!("cannot follow redirect to {target}: {error}"))
            })?
        else {
            return Err(FailureReason::protocol(format!(
                "cannot follow redirect to {target}"
            )));
        };
        let request = request.redirected(path);
        debug!(status, %target, "following redirect");

        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        let channel = self.connector.connect(&address).inspect_err(|error| {
            warn!(%address, %error, "connect failed while following a redirect");
        })?;
        self.redirects.push(target);
        self.channel = Some(channel);
        self.host_header = address.host_header();
        self.outgoing = request.encode(&self.host_header);
        self.outgoing_sent = 0;
        self.address = Some(address);
        self.request = Some(request);
        self.header.clear();
        self.flush_request()
    }

    fn deliver(&mut self, buf: &mut [u8]) -> TransferEvent {
        if self.expected.is_some_and(|expected| self.received >= expected) {
            return self.complete();
        }
        if self.chunked.as_ref().is_some_and(ChunkedDecoder::is_finished) {
            return self.end_of_stream();
        }

        let now = self.clock.now();
        let mut budget = buf.len();
        if let Some(expected) = self.expected {
            let remaining = usize::try_from(expected - self.received).unwrap_or(usize::MAX);
            budget = budget.min(remaining);
        }
        if let Some(limiter) = self.limiter.as_mut() {
            budget = limiter.recommended_read_size(budget, now);
        }
        if budget == 0 {
            return TransferEvent::WouldBlock;
        }

        let n = if self.chunked.is_some() {
            match self.decode_chunked(&mut buf[..budget]) {
                Ok(Some(n)) => n,
                Ok(None) if self.chunked.as_ref().is_some_and(ChunkedDecoder::is_finished) => {
                    return self.end_of_stream();
                }
                Ok(None) => return TransferEvent::WouldBlock,
                Err(reason) => return self.fail(reason),
            }
        } else if self.early_sent < self.early_body.len() {
            let pending = &self.early_body[self.early_sent..];
            let n = pending.len().min(budget);
            buf[..n].copy_from_slice(&pending[..n]);
            self.early_sent += n;
            if self.early_sent == self.early_body.len() {
                self.early_body = Vec::new();
                self.early_sent = 0;
            }
            n
        } else {
            let channel = match self.channel() {
                Ok(channel) => channel,
                Err(reason) => return self.fail(reason),
            };
            match channel.try_read(&mut buf[..budget]) {
                Ok(0) => return self.end_of_stream(),
                Ok(n) => n,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return TransferEvent::WouldBlock;
                }
                Err(error) => return self.fail(error.into()),
            }
        };

        self.received += n as u64;
        self.meter.record(n);
        if let Some(limiter) = self.limiter.as_mut() {
            limiter.register(n, now);
        }
        trace!(bytes = n, received = self.received, "body bytes delivered");

        let body_done = match &self.chunked {
            Some(decoder) => {
                decoder.is_finished()
                    && self.expected.is_none_or(|expected| self.received >= expected)
            }
            None => false,
        };
        if body_done || self.expected.is_some_and(|expected| self.received >= expected) {
            self.settle(SessionStatus::Complete);
        }
        TransferEvent::DataAvailable(n)
    }

    /// Decodes chunked framing into `out`, reading more wire bytes as needed.
    ///
    /// `Ok(None)` means nothing is available yet or the body has ended.
    fn decode_chunked(&mut self, out: &mut [u8]) -> Result<Option<usize>, FailureReason> {
        loop {
            let Some(decoder) = self.chunked.as_mut() else {
                return Ok(None);
            };
            if decoder.is_finished() {
                return Ok(None);
            }
            if self.early_sent < self.early_body.len() {
                let step = decoder.decode(&self.early_body[self.early_sent..], out)?;
                self.early_sent += step.consumed;
                if self.early_sent == self.early_body.len() {
                    self.early_body.clear();
                    self.early_sent = 0;
                }
                if step.produced > 0 {
                    return Ok(Some(step.produced));
                }
                continue;
            }

            let mut scratch = [0u8; HEADER_READ_CHUNK];
            match self.channel()?.try_read(&mut scratch) {
                Ok(0) => {
                    let received = self.received;
                    return Err(self
                        .chunked
                        .as_ref()
                        .map_or(FailureReason::Cancelled, |decoder| decoder.truncation(received)));
                }
                Ok(n) => {
                    trace!(bytes = n, "chunked wire bytes read");
                    self.early_body.extend_from_slice(&scratch[..n]);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn end_of_stream(&mut self) -> TransferEvent {
        match self.expected {
            Some(expected) if self.received < expected => self.fail(FailureReason::Truncated {
                expected,
                received: self.received,
            }),
            _ => self.complete(),
        }
    }

    fn complete(&mut self) -> TransferEvent {
        if self.status != SessionStatus::Complete {
            self.settle(SessionStatus::Complete);
        }
        TransferEvent::Complete
    }

    fn fail(&mut self, reason: FailureReason) -> TransferEvent {
        warn!(%reason, received = self.received, "transfer failed");
        self.settle(SessionStatus::Failed(reason.clone()));
        TransferEvent::Failed(reason)
    }

    /// Enters a terminal state: closes the channel and freezes the rate.
    fn settle(&mut self, status: SessionStatus) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.meter.freeze(self.clock.now());
        if status == SessionStatus::Complete {
            debug!(received = self.received, "transfer complete");
        }
        self.status = status;
    }
}

impl<N: Connector, K: Clock> fmt::Debug for TransferSession<N, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("status", &self.status)
            .field("expected", &self.expected)
            .field("received", &self.received)
            .field("throttled", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl<N: Connector, K: Clock> TransferSource for TransferSession<N, K> {
    fn poll(&mut self, buf: &mut [u8]) -> TransferEvent {
        Self::poll(self, buf)
    }

    fn expected_length(&self) -> Option<u64> {
        self.expected
    }

    fn cancel(&mut self) {
        self.disconnect();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn release(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            debug!(received = self.received, "session released before the end of the body");
            channel.close();
            self.meter.freeze(self.clock.now());
        }
    }
}
