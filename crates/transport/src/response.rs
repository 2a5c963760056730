//! Response head parsing.

use memchr::memmem;

use crate::error::FailureReason;

/// Largest response head accepted before giving up.
pub const MAX_HEADER_LEN: usize = 16 * 1024;

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Parsed status line and the headers the session cares about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ResponseHead {
    pub(crate) status: u16,
    pub(crate) content_length: Option<u64>,
    pub(crate) chunked: bool,
    pub(crate) location: Option<String>,
}

/// What the session should do with a response, judged by its status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum StatusAction {
    /// Deliver the body.
    Accept,
    /// Request the resource again from `Location`.
    Redirect,
}

/// Returns the length of the head including its blank-line terminator once
/// `buffer` contains one. `searched` is how many bytes were already scanned.
pub(crate) fn find_head_end(buffer: &[u8], searched: usize) -> Option<usize> {
    let start = searched.saturating_sub(TERMINATOR.len() - 1);
    memmem::find(&buffer[start..], TERMINATOR).map(|offset| start + offset + TERMINATOR.len())
}

/// Parses a complete head (status line, headers, terminator).
pub(crate) fn parse_head(head: &[u8]) -> Result<ResponseHead, FailureReason> {
    let text = std::str::from_utf8(head)
        .map_err(|_| FailureReason::protocol("response head is not valid UTF-8"))?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(FailureReason::protocol(format!(
            "malformed status line '{}'",
            status_line.escape_debug()
        )));
    }
    let status = parts
        .next()
        .filter(|code| code.len() == 3)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            FailureReason::protocol(format!(
                "malformed status line '{}'",
                status_line.escape_debug()
            ))
        })?;

    let mut content_length = None;
    let mut chunked = false;
    let mut location = None;
    for line in lines.take_while(|line| !line.is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            return Err(FailureReason::protocol(format!(
                "malformed header line '{}'",
                line.escape_debug()
            )));
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            let parsed = value.parse::<u64>().map_err(|_| {
                FailureReason::protocol(format!("invalid Content-Length '{value}'"))
            })?;
            if content_length.is_some_and(|previous| previous != parsed) {
                return Err(FailureReason::protocol("conflicting Content-Length headers"));
            }
            content_length = Some(parsed);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = parse_transfer_encoding(value)?;
        } else if name.eq_ignore_ascii_case("location") && !value.is_empty() {
            location = Some(value.to_owned());
        }
    }

    Ok(ResponseHead {
        status,
        content_length,
        chunked,
        location,
    })
}

/// Returns `true` when the codings end in `chunked`. Only `identity` may
/// accompany it.
fn parse_transfer_encoding(value: &str) -> Result<bool, FailureReason> {
    let codings: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .collect();
    let mut chunked = false;
    for (index, coding) in codings.iter().enumerate() {
        if coding.eq_ignore_ascii_case("identity") {
            continue;
        }
        if coding.eq_ignore_ascii_case("chunked") && index + 1 == codings.len() {
            chunked = true;
            continue;
        }
        return Err(FailureReason::protocol(format!(
            "unsupported Transfer-Encoding '{value}'"
        )));
    }
    Ok(chunked)
}

/// Maps a status code onto an action or the failure it represents.
pub(crate) fn check_status(status: u16) -> Result<StatusAction, FailureReason> {
    match status {
        200 | 202 | 206 => Ok(StatusAction::Accept),
        300 | 301 | 302 | 303 | 307 | 308 => Ok(StatusAction::Redirect),
        404 | 410 => Err(FailureReason::NotFound { status }),
        other => Err(FailureReason::protocol(format!(
            "unexpected response status {other}"
        ))),
    }
}
