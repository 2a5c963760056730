//! Incremental decoder for `Transfer-Encoding: chunked` bodies.
//!
//! Each chunk is a hexadecimal size line, optionally carrying extensions after
//! a `;`, followed by that many data bytes and a CRLF. A zero-size chunk ends
//! the body; trailer header lines may follow until an empty line.
//!
//! [`ChunkedDecoder::decode`] accepts arbitrary slices of the wire stream, so
//! size lines and CRLFs may be split across any number of reads.

use crate::error::FailureReason;
use crate::response::MAX_HEADER_LEN;

/// Hex digits that still fit a `u64` chunk size.
const MAX_SIZE_DIGITS: u8 = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Reading the hexadecimal size; `extension` once `;` or whitespace was seen.
    Size { size: u64, digits: u8, extension: bool },
    /// Size line ended with CR; expecting LF.
    SizeLf { size: u64 },
    /// Copying chunk data.
    Data { remaining: u64 },
    /// Expecting the CR after chunk data.
    DataCr,
    /// Expecting the LF after chunk data.
    DataLf,
    /// Inside a trailer line of `line_len` bytes so far.
    Trailer { line_len: usize },
    /// Trailer line ended with CR; expecting LF.
    TrailerLf { line_len: usize },
    /// The terminating empty line was read.
    Finished,
}

/// Progress of one [`ChunkedDecoder::decode`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Decoded {
    /// Wire bytes taken from the input.
    pub(crate) consumed: usize,
    /// Body bytes written to the output.
    pub(crate) produced: usize,
}

/// Strips chunk framing from a wire stream.
#[derive(Clone, Debug)]
pub(crate) struct ChunkedDecoder {
    state: State,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub(crate) const fn new() -> Self {
        Self {
            state: State::Size {
                size: 0,
                digits: 0,
                extension: false,
            },
        }
    }

    /// Returns `true` once the terminating chunk and trailers were consumed.
    pub(crate) const fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Decodes as much of `input` as fits into `output`.
    ///
    /// Stops early when `output` is full inside chunk data or when the body
    /// ends; unconsumed input is left for the caller.
    pub(crate) fn decode(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Decoded, FailureReason> {
        let mut progress = Decoded::default();

        while progress.consumed < input.len() {
            if let State::Data { remaining } = self.state {
                let room = output.len() - progress.produced;
                if room == 0 {
                    break;
                }
                let available = input.len() - progress.consumed;
                let n = usize::try_from(remaining)
                    .unwrap_or(usize::MAX)
                    .min(available)
                    .min(room);
                let from = &input[progress.consumed..progress.consumed + n];
                output[progress.produced..progress.produced + n].copy_from_slice(from);
                progress.consumed += n;
                progress.produced += n;
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    State::DataCr
                } else {
                    State::Data { remaining }
                };
                continue;
            }
            if self.is_finished() {
                break;
            }

            let byte = input[progress.consumed];
            progress.consumed += 1;
            self.state = self.advance(byte)?;
        }

        Ok(progress)
    }

    /// Failure to report when the wire ends before the terminating chunk.
    ///
    /// `received` is the number of body bytes delivered so far.
    pub(crate) fn truncation(&self, received: u64) -> FailureReason {
        match self.state {
            State::Data { remaining } => FailureReason::Truncated {
                expected: received.saturating_add(remaining),
                received,
            },
            _ => FailureReason::protocol(
                "connection closed before the terminating chunk",
            ),
        }
    }

    fn advance(&self, byte: u8) -> Result<State, FailureReason> {
        let state = match (self.state, byte) {
            (State::Size { digits: 0, .. }, b'\r') => {
                return Err(FailureReason::protocol("empty chunk size line"));
            }
            (State::Size { size, .. }, b'\r') => State::SizeLf { size },
            (State::Size { size, digits, extension: false }, _) if byte.is_ascii_hexdigit() => {
                if digits == MAX_SIZE_DIGITS {
                    return Err(FailureReason::protocol("chunk size does not fit in 64 bits"));
                }
                let value = u64::from(hex_value(byte));
                State::Size {
                    size: (size << 4) | value,
                    digits: digits + 1,
                    extension: false,
                }
            }
            (State::Size { size, digits, .. }, b';' | b' ' | b'\t') if digits > 0 => State::Size {
                size,
                digits,
                extension: true,
            },
            (state @ State::Size { extension: true, .. }, _) if byte != b'\n' => state,
            (State::Size { .. }, _) => {
                return Err(FailureReason::protocol(format!(
                    "invalid byte {:?} in chunk size line",
                    char::from(byte)
                )));
            }
            (State::SizeLf { size: 0 }, b'\n') => State::Trailer { line_len: 0 },
            (State::SizeLf { size }, b'\n') => State::Data { remaining: size },
            (State::DataCr, b'\r') => State::DataLf,
            (State::DataLf, b'\n') => State::Size {
                size: 0,
                digits: 0,
                extension: false,
            },
            (State::Trailer { line_len }, b'\r') => State::TrailerLf { line_len },
            (State::Trailer { line_len }, _) => {
                if line_len >= MAX_HEADER_LEN {
                    return Err(FailureReason::protocol(format!(
                        "chunk trailer exceeds {MAX_HEADER_LEN} bytes"
                    )));
                }
                State::Trailer {
                    line_len: line_len + 1,
                }
            }
            (State::TrailerLf { line_len: 0 }, b'\n') => State::Finished,
            (State::TrailerLf { .. }, b'\n') => State::Trailer { line_len: 0 },
            (State::SizeLf { .. } | State::DataCr | State::DataLf | State::TrailerLf { .. }, _) => {
                return Err(FailureReason::protocol("missing CRLF in chunked body"));
            }
            (State::Data { .. } | State::Finished, _) => self.state,
        };
        Ok(state)
    }
}

const fn hex_value(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        _ => byte - b'A' + 10,
    }
}
