use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::address::Address;
use crate::channel::{ByteChannel, TcpChannel};
use crate::error::ConnectError;

/// Default upper bound on establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens channels to remote addresses.
pub trait Connector {
    /// Channel type produced on success.
    type Channel: ByteChannel;

    /// Establishes a channel to `address`.
    fn connect(&mut self, address: &Address) -> Result<Self::Channel, ConnectError>;
}

impl<N: Connector + ?Sized> Connector for &mut N {
    type Channel = N::Channel;

    fn connect(&mut self, address: &Address) -> Result<Self::Channel, ConnectError> {
        (**self).connect(address)
    }
}

/// [`Connector`] for plain TCP.
///
/// The connect itself is the one bounded wait in the pipeline; the resulting
/// [`TcpChannel`] is non-blocking.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TcpConnector {
    timeout: Option<Duration>,
}

impl TcpConnector {
    /// A connector using [`DEFAULT_CONNECT_TIMEOUT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Replaces the connect timeout; `None` waits for the OS default.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured connect timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn connect_candidate(&self, candidate: SocketAddr) -> io::Result<TcpStream> {
        match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    type Channel = TcpChannel;

    fn connect(&mut self, address: &Address) -> Result<Self::Channel, ConnectError> {
        let display = address.to_string();
        let host = address.host().trim_start_matches('[').trim_end_matches(']');
        let candidates: Vec<SocketAddr> = (host, address.port())
            .to_socket_addrs()
            .map_err(|error| ConnectError::Unreachable {
                address: display.clone(),
                detail: error.to_string(),
            })?
            .collect();

        let mut last_error = None;
        for candidate in candidates {
            debug!(%candidate, "connecting");
            match self.connect_candidate(candidate) {
                Ok(stream) => {
                    return TcpChannel::new(stream)
                        .map_err(|error| ConnectError::from_io(display.clone(), &error));
                }
                Err(error) => {
                    debug!(%candidate, %error, "connect attempt failed");
                    last_error = Some(error);
                }
            }
        }

        Err(match last_error {
            Some(error) => ConnectError::from_io(display, &error),
            None => ConnectError::Unreachable {
                address: display,
                detail: "host did not resolve to any addresses".to_owned(),
            },
        })
    }
}
