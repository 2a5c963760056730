use std::fmt;
use std::str::FromStr;

use memchr::memchr;
use thiserror::Error;

use crate::error::RequestError;

/// Inclusive byte range `first..=last` of a resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ByteRange {
    first: u64,
    last: u64,
}

impl ByteRange {
    /// Returns `None` when `first > last`.
    #[must_use]
    pub const fn new(first: u64, last: u64) -> Option<Self> {
        if first <= last {
            Some(Self { first, last })
        } else {
            None
        }
    }

    /// Offset of the first byte.
    #[must_use]
    pub const fn first(&self) -> u64 {
        self.first
    }

    /// Offset of the last byte.
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.last
    }

    /// Number of bytes covered. Saturates for the full `0..=u64::MAX` range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        (self.last - self.first).saturating_add(1)
    }

    /// Always `false`; a range covers at least one byte.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Error returned when a `FIRST-LAST` range cannot be parsed.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid byte range '{0}' (expected FIRST-LAST with FIRST <= LAST)")]
pub struct ByteRangeParseError(String);

impl FromStr for ByteRange {
    type Err = ByteRangeParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ByteRangeParseError(text.to_owned());
        let dash = memchr(b'-', text.as_bytes()).ok_or_else(invalid)?;
        let first = text[..dash].trim().parse::<u64>().map_err(|_| invalid())?;
        let last = text[dash + 1..].trim().parse::<u64>().map_err(|_| invalid())?;
        Self::new(first, last).ok_or_else(invalid)
    }
}

/// Identity of the resource to fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRequest {
    name: String,
    expected_length: Option<u64>,
    range: Option<ByteRange>,
}

impl ResourceRequest {
    /// Requests `name` with unknown length.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected_length: None,
            range: None,
        }
    }

    /// Declares the total length the caller expects.
    #[must_use]
    pub const fn with_expected_length(mut self, length: u64) -> Self {
        self.expected_length = Some(length);
        self
    }

    /// Restricts the request to `range`.
    #[must_use]
    pub const fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the requested range, if any.
    #[must_use]
    pub const fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Bytes the response body should contain, if known up front.
    ///
    /// A range implies its own length when no length was declared.
    #[must_use]
    pub fn expected_length(&self) -> Option<u64> {
        self.expected_length
            .or_else(|| self.range.map(|range| range.len()))
    }

    /// Rejects requests that the framing cannot carry.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.name.is_empty() {
            return Err(RequestError::ProtocolError(
                "resource name must not be empty".to_owned(),
            ));
        }
        if self
            .name
            .bytes()
            .any(|byte| byte.is_ascii_whitespace() || byte.is_ascii_control())
        {
            return Err(RequestError::ProtocolError(format!(
                "resource name '{}' contains whitespace or control characters",
                self.name.escape_debug()
            )));
        }
        if let (Some(declared), Some(range)) = (self.expected_length, self.range) {
            if declared != range.len() {
                return Err(RequestError::ProtocolError(format!(
                    "declared length {declared} does not match range {range}"
                )));
            }
        }
        Ok(())
    }

    /// Path and query sent on the request line.
    pub(crate) fn target(&self) -> String {
        if self.name.starts_with('/') {
            self.name.clone()
        } else {
            format!("/{}", self.name)
        }
    }

    /// The same request for another name, keeping length and range.
    pub(crate) fn redirected(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Renders the request head sent to `host`.
    pub(crate) fn encode(&self, host: &str) -> Vec<u8> {
        let target = self.target();
        let mut head = format!(
            "GET {target} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: streampump/{}\r\nAccept-Encoding: identity\r\nConnection: close\r\n",
            env!("CARGO_PKG_VERSION")
        );
        if let Some(range) = self.range {
            head.push_str(&format!("Range: bytes={range}\r\n"));
        }
        head.push_str("\r\n");
        head.into_bytes()
    }
}
