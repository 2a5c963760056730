#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Test doubles shared by the streampump integration suites.
//!
//! Everything here is single-threaded and deterministic: channels replay a
//! script, clocks only move when told to, and destinations accept bytes on a
//! fixed schedule.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use bandwidth::Clock;
use tempfile::TempDir;
use transfer::Destination;
use transport::{Address, ByteChannel, ConnectError, Connector};

/// One scripted outcome of [`ByteChannel::try_read`].
#[derive(Debug)]
pub enum ReadStep {
    /// Deliver these bytes (split across reads if the buffer is smaller).
    Data(Vec<u8>),
    /// Report [`io::ErrorKind::WouldBlock`] once.
    Block,
    /// Fail with this error kind.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct Wire {
    reads: VecDeque<ReadStep>,
    written: Vec<u8>,
    write_schedule: VecDeque<usize>,
    hold_open: bool,
    closed: bool,
}

/// A [`ByteChannel`] replaying a read script and recording writes.
///
/// Clones share the same wire, so a test keeps one handle for inspection
/// while the session owns the other. Once the script runs out the channel
/// reports end of stream, or `WouldBlock` when [`hold_open`](Self::hold_open)
/// was called.
#[derive(Clone, Debug, Default)]
pub struct ScriptedChannel {
    wire: Rc<RefCell<Wire>>,
}

impl ScriptedChannel {
    /// A channel with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that delivers `bytes` and then ends.
    #[must_use]
    pub fn replying(bytes: impl Into<Vec<u8>>) -> Self {
        let channel = Self::new();
        channel.push(ReadStep::Data(bytes.into()));
        channel
    }

    /// Appends a step to the read script.
    pub fn push(&self, step: ReadStep) {
        self.wire.borrow_mut().reads.push_back(step);
    }

    /// Appends bytes to the read script.
    pub fn push_data(&self, bytes: impl Into<Vec<u8>>) {
        self.push(ReadStep::Data(bytes.into()));
    }

    /// Caps successive writes at the given sizes; later writes are unlimited.
    /// A zero entry reports `WouldBlock` for that call.
    pub fn limit_writes(&self, schedule: impl IntoIterator<Item = usize>) {
        self.wire.borrow_mut().write_schedule.extend(schedule);
    }

    /// Reports `WouldBlock` instead of end of stream once the script is drained.
    pub fn hold_open(&self) {
        self.wire.borrow_mut().hold_open = true;
    }

    /// Everything written to the channel so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.wire.borrow().written.clone()
    }

    /// Returns `true` after [`ByteChannel::close`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.wire.borrow().closed
    }
}

impl ByteChannel for ScriptedChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        match wire.reads.pop_front() {
            Some(ReadStep::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    wire.reads.push_front(ReadStep::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(ReadStep::Block) => Err(io::ErrorKind::WouldBlock.into()),
            Some(ReadStep::Fail(kind)) => Err(kind.into()),
            None if wire.hold_open => Err(io::ErrorKind::WouldBlock.into()),
            None => Ok(0),
        }
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let allowed = wire.write_schedule.pop_front().unwrap_or(usize::MAX);
        if allowed == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = allowed.min(buf.len());
        wire.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn close(&mut self) {
        self.wire.borrow_mut().closed = true;
    }
}

/// A [`Connector`] handing out pre-built outcomes in order.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    outcomes: VecDeque<Result<ScriptedChannel, ConnectError>>,
    attempts: Vec<Address>,
}

impl ScriptedConnector {
    /// A connector that succeeds once with `channel`.
    #[must_use]
    pub fn with_channel(channel: ScriptedChannel) -> Self {
        let mut connector = Self::default();
        connector.push(Ok(channel));
        connector
    }

    /// Queues the outcome of a later `connect`.
    pub fn push(&mut self, outcome: Result<ScriptedChannel, ConnectError>) {
        self.outcomes.push_back(outcome);
    }

    /// Addresses passed to `connect`, in order.
    #[must_use]
    pub fn attempts(&self) -> &[Address] {
        &self.attempts
    }
}

impl Connector for ScriptedConnector {
    type Channel = ScriptedChannel;

    fn connect(&mut self, address: &Address) -> Result<Self::Channel, ConnectError> {
        self.attempts.push(address.clone());
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Err(ConnectError::Refused {
                address: address.to_string(),
            }))
    }
}

/// A [`Clock`] that only moves through [`advance`](Self::advance).
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// A clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Moves every clone of this clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Total time advanced so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// A [`Destination`] that accepts bytes on a fixed schedule.
///
/// Each write takes at most the next scheduled amount; a zero entry reports
/// `WouldBlock`. Once the schedule is exhausted writes are unlimited.
#[derive(Debug, Default)]
pub struct PartialDestination {
    bytes: Vec<u8>,
    schedule: VecDeque<usize>,
    repeat: Option<Vec<usize>>,
    write_calls: usize,
}

impl PartialDestination {
    /// A destination following `schedule` once.
    #[must_use]
    pub fn new(schedule: impl IntoIterator<Item = usize>) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A destination repeating `pattern` forever.
    #[must_use]
    pub fn repeating(pattern: impl IntoIterator<Item = usize>) -> Self {
        let pattern: Vec<usize> = pattern.into_iter().collect();
        Self {
            schedule: pattern.iter().copied().collect(),
            repeat: (!pattern.is_empty()).then_some(pattern),
            ..Self::default()
        }
    }

    /// Bytes accepted so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of `write` calls, including ones that blocked.
    #[must_use]
    pub const fn write_calls(&self) -> usize {
        self.write_calls
    }

    fn next_allowance(&mut self) -> usize {
        if self.schedule.is_empty() {
            if let Some(pattern) = &self.repeat {
                self.schedule.extend(pattern.iter().copied());
            }
        }
        self.schedule.pop_front().unwrap_or(usize::MAX)
    }
}

impl Destination for PartialDestination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_calls += 1;
        let allowed = self.next_allowance();
        if allowed == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = allowed.min(buf.len());
        self.bytes.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Builds a complete response with a `Content-Length` header.
#[must_use]
pub fn http_response(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let mut response = http_head(status, reason, Some(body.len() as u64));
    response.extend_from_slice(body);
    response
}

/// Builds a `Transfer-Encoding: chunked` response carrying `chunks` in order.
#[must_use]
pub fn chunked_response(chunks: &[&[u8]]) -> Vec<u8> {
    let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for chunk in chunks.iter().filter(|chunk| !chunk.is_empty()) {
        response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        response.extend_from_slice(chunk);
        response.extend_from_slice(b"\r\n");
    }
    response.extend_from_slice(b"0\r\n\r\n");
    response
}

/// Builds a bodiless redirect pointing at `location`.
#[must_use]
pub fn redirect_response(status: u16, location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} Moved\r\nLocation: {location}\r\nContent-Length: 0\r\n\r\n"
    )
    .into_bytes()
}

/// Builds a response head, optionally declaring a length.
#[must_use]
pub fn http_head(status: u16, reason: &str, content_length: Option<u64>) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
    if let Some(length) = content_length {
        head.push_str(&format!("Content-Length: {length}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");
    head.into_bytes()
}

/// The 2,600,000-byte alphabet payload: each letter repeated 100,000 times.
#[must_use]
pub fn alphabet_payload() -> Vec<u8> {
    let mut payload = Vec::with_capacity(26 * 100_000);
    for letter in b'a'..=b'z' {
        payload.resize(payload.len() + 100_000, letter);
    }
    payload
}

/// Deterministic pseudo-random bytes from a linear congruential generator.
#[must_use]
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 56) as u8
        })
        .collect()
}

/// Writes `contents` into a fresh temporary directory, returning the
/// directory guard and the file path.
pub fn temp_file(name: &str, contents: &[u8]) -> io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    std::fs::write(&path, contents)?;
    Ok((dir, path))
}
