use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Port used when an `http://` locator omits one.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Host and TCP port of a remote endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Creates an address, trimming surrounding whitespace from `host`.
    pub fn new(host: impl AsRef<str>, port: u16) -> Result<Self, LocatorError> {
        let trimmed = host.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LocatorError::MissingHost);
        }
        Ok(Self {
            host: trimmed.to_owned(),
            port,
        })
    }

    /// Returns the host name or literal address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Value for a `Host` request header; the port is omitted when it is the
    /// HTTP default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = self.bracketed_host();
        if self.port == DEFAULT_HTTP_PORT {
            host.into_owned()
        } else {
            format!("{host}:{}", self.port)
        }
    }

    fn bracketed_host(&self) -> std::borrow::Cow<'_, str> {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host).into()
        } else {
            self.host.as_str().into()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bracketed_host(), self.port)
    }
}

/// Where a resource lives: behind an HTTP endpoint or on the local disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceLocator {
    /// `http://host[:port]/path`.
    Remote {
        /// Endpoint to connect to.
        address: Address,
        /// Request target, including any query string.
        path: String,
    },
    /// A local file path.
    Local(PathBuf),
}

impl ResourceLocator {
    /// Parses a command-line resource operand.
    ///
    /// Anything containing `://` is treated as a URL; everything else is a
    /// local path.
    pub fn parse(text: &str) -> Result<Self, LocatorError> {
        if !text.contains("://") {
            if text.is_empty() {
                return Err(LocatorError::Empty);
            }
            return Ok(Self::Local(PathBuf::from(text)));
        }

        let url = Url::parse(text)?;
        if url.scheme() != "http" {
            return Err(LocatorError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let host = url.host_str().ok_or(LocatorError::MissingHost)?;
        let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);
        let address = Address::new(host, port)?;

        let mut path = url.path().to_owned();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self::Remote { address, path })
    }

    /// Returns `true` for [`ResourceLocator::Remote`].
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl FromStr for ResourceLocator {
    type Err = LocatorError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { address, path } => write!(f, "http://{}{path}", address.host_header()),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors produced while parsing a [`ResourceLocator`] or [`Address`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum LocatorError {
    /// The operand was empty.
    #[error("resource must not be empty")]
    Empty,
    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than `http`.
    #[error("unsupported scheme '{0}' (only http is supported)")]
    UnsupportedScheme(String),
    /// The URL or address has no host.
    #[error("missing host")]
    MissingHost,
}
