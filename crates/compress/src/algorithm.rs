//! Compression formats an engine can be built for.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Wire format produced by compression and expected by decompression.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CompressionAlgorithm {
    /// zlib-wrapped deflate.
    #[default]
    Zlib,
    /// Zstandard frames.
    #[cfg(feature = "zstd")]
    Zstd,
}

#[cfg(feature = "zstd")]
const AVAILABLE: &[CompressionAlgorithm] = &[CompressionAlgorithm::Zlib, CompressionAlgorithm::Zstd];

#[cfg(not(feature = "zstd"))]
const AVAILABLE: &[CompressionAlgorithm] = &[CompressionAlgorithm::Zlib];

impl CompressionAlgorithm {
    /// Lowercase name accepted by [`FromStr`] and shown in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zlib => "zlib",
            #[cfg(feature = "zstd")]
            Self::Zstd => "zstd",
        }
    }

    /// Algorithm used when callers do not pick one.
    #[must_use]
    pub const fn default_algorithm() -> Self {
        Self::Zlib
    }

    /// Algorithms compiled into this build.
    #[must_use]
    pub const fn available() -> &'static [Self] {
        AVAILABLE
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm name this build does not know.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unsupported compression algorithm '{input}' (expected one of: {})", available_names())]
pub struct CompressionAlgorithmParseError {
    input: String,
}

impl CompressionAlgorithmParseError {
    /// The rejected name, trimmed and lowercased.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}

fn available_names() -> String {
    AVAILABLE
        .iter()
        .map(|algorithm| algorithm.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for CompressionAlgorithm {
    type Err = CompressionAlgorithmParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let name = text.trim().to_ascii_lowercase();
        AVAILABLE
            .iter()
            .copied()
            .find(|algorithm| algorithm.name() == name)
            .or_else(|| (name == "deflate").then_some(Self::Zlib))
            .ok_or(CompressionAlgorithmParseError { input: name })
    }
}
