//! Failures surfaced by the command-line front end.

use std::io;
use std::time::Duration;

use thiserror::Error;
use transfer::TransferError;

use crate::exit_code::ExitCode;

/// Everything that can end a `transfer` invocation unsuccessfully.
#[derive(Debug, Error)]
pub enum CliError {
    /// An operand or option was rejected after parsing.
    #[error("{0}")]
    Usage(String),

    /// The pipeline itself failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// No data moved within the `--timeout` window.
    #[error("no data moved for {} s", .0.as_secs())]
    IdleTimeout(Duration),

    /// Copying buffered output to standard output failed.
    #[error("cannot write standard output: {0}")]
    Stdout(#[source] io::Error),
}

impl CliError {
    /// Exit code reported for this failure.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::Usage,
            Self::Transfer(error) => error.class().into(),
            Self::IdleTimeout(_) => ExitCode::Connection,
            Self::Stdout(_) => ExitCode::Io,
        }
    }

    /// Kind label for the `transfer: <kind>: <detail>` diagnostic.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::Transfer(error) => error.kind_label(),
            Self::IdleTimeout(_) => "timed out",
            Self::Stdout(_) => "write error",
        }
    }
}
