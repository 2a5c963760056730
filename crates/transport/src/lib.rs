#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `transport` owns everything between the network and the buffer pump:
//! non-blocking byte channels, the connectors that open them, and the
//! [`TransferSession`] state machine that requests one resource and yields its
//! body through [`TransferSession::poll`].
//!
//! # Design
//!
//! - [`ByteChannel`] is the only I/O seam. [`TcpChannel`] and [`FileChannel`]
//!   implement it for sockets and local files; tests supply scripted channels.
//! - [`Connector`] opens channels. [`TcpConnector`] is the one place that may
//!   wait, bounded by its connect timeout.
//! - [`TransferSession`] frames an HTTP/1.1 `GET`, parses the response head,
//!   follows redirects, strips chunked framing, and delivers body bytes,
//!   optionally paced by a [`BandwidthLimiter`](bandwidth::BandwidthLimiter).
//! - [`TransferSource`] abstracts "something that yields resource bytes" so
//!   the pump can read from a session or from a bare [`ChannelSource`].
//!
//! # Invariants
//!
//! - `poll` never blocks and never returns more than the buffer length or the
//!   remaining expected length.
//! - The delivered byte count only grows while the session is transferring;
//!   it and the measured rate are frozen once the session completes or fails.
//! - `Complete` and `Failed` are terminal and repeat on every later poll.
//!
//! # Errors
//!
//! [`ConnectError`] and [`RequestError`] are returned synchronously.
//! Everything that happens after the request is sent arrives as
//! [`TransferEvent::Failed`] carrying a [`FailureReason`].
//!
//! # Examples
//!
//! Read a local file through the same source contract the pump uses.
//!
//! ```
//! use std::io::Write;
//! use transport::{ChannelSource, TransferEvent, TransferSource};
//!
//! let mut file = tempfile::NamedTempFile::new().unwrap();
//! file.write_all(b"payload").unwrap();
//!
//! let mut source = ChannelSource::open_file(file.path()).unwrap();
//! let mut buf = [0u8; 16];
//! assert_eq!(source.poll(&mut buf), TransferEvent::DataAvailable(7));
//! assert_eq!(&buf[..7], b"payload");
//! assert_eq!(source.poll(&mut buf), TransferEvent::Complete);
//! ```

mod address;
mod channel;
mod chunked;
mod connector;
mod error;
mod request;
mod response;
mod session;
mod source;

pub use address::{Address, DEFAULT_HTTP_PORT, LocatorError, ResourceLocator};
pub use channel::{ByteChannel, FileChannel, TcpChannel};
pub use connector::{Connector, DEFAULT_CONNECT_TIMEOUT, TcpConnector};
pub use error::{ConnectError, FailureReason, RequestError};
pub use request::{ByteRange, ByteRangeParseError, ResourceRequest};
pub use response::MAX_HEADER_LEN;
pub use session::{MAX_REDIRECTS, SessionStatus, TransferSession};
pub use source::{ChannelSource, TransferEvent, TransferSource};
