//! Destination selection: a file on disk or buffered standard output.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;
use transfer::{Destination, FileDestination, Ramfile, TransferError};

use crate::command::STDOUT_OPERAND;
use crate::error::CliError;

/// Where the pipeline's output lands.
#[derive(Debug)]
pub(crate) enum OutputSink {
    /// A file created or truncated at start.
    File(FileDestination),
    /// Output collected in memory and copied to standard output at the end.
    Stdout(Ramfile),
}

impl OutputSink {
    /// Opens the sink named by the `DESTINATION` operand.
    pub(crate) fn open(operand: &OsStr) -> Result<Self, TransferError> {
        if operand == STDOUT_OPERAND {
            return Ok(Self::Stdout(Ramfile::new()));
        }
        let path = Path::new(operand);
        FileDestination::create(path)
            .map(Self::File)
            .map_err(|error| TransferError::Destination {
                kind: error.kind(),
                message: format!("{}: {error}", path.display()),
            })
    }

    /// Hands buffered output to `stdout`. Files need no further work; a
    /// partially written file stays where it is.
    pub(crate) fn finish<W: Write>(self, stdout: &mut W) -> Result<(), CliError> {
        match self {
            Self::File(file) => {
                debug!(path = %file.path().display(), bytes = Destination::len(&file), "destination closed");
                Ok(())
            }
            Self::Stdout(ram) => {
                stdout
                    .write_all(ram.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(CliError::Stdout)
            }
        }
    }
}

impl Destination for OutputSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => Destination::write(file, bytes),
            Self::Stdout(ram) => Destination::write(ram, bytes),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Self::File(file) => Destination::len(file),
            Self::Stdout(ram) => Destination::len(ram),
        }
    }
}
