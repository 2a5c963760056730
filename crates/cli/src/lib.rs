#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the `transfer` command: fetch one resource, stream it
//! through a compressor or decompressor, and write the result to a file or
//! to standard output.
//!
//! ```text
//! transfer [OPTIONS] <RESOURCE> <DESTINATION>
//! ```
//!
//! `RESOURCE` is either `http://host[:port]/path` or a local path.
//! `DESTINATION` is a path, or `-` for standard output.
//!
//! # Design
//!
//! [`run`] and [`run_with`] accept an iterator of arguments together with
//! handles for standard output and error, so the whole front end can be
//! exercised in-process. Parsing uses a [`clap`](https://docs.rs/clap/)
//! builder definition. The parsed options become a
//! [`transfer::TransferConfig`]; the resource becomes either a
//! [`transport::TransferSession`] over TCP or a [`transport::ChannelSource`]
//! over a local file. A single-threaded loop then steps a
//! [`transfer::BufferPump`], sleeping briefly whenever the source has nothing
//! to offer.
//!
//! Output for `-` is collected in a [`transfer::Ramfile`] and copied to
//! standard output when the pump stops.
//!
//! # Invariants
//!
//! - `run` never panics; every failure becomes a non-zero [`ExitCode`].
//! - A failing transfer prints exactly one `transfer: <kind>: <detail>` line
//!   on standard error.
//! - Partially written destinations are left in place.
//!
//! # Errors
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | connect failure, timeout, cancellation, lost connection |
//! | 2 | not found, protocol error, empty resource |
//! | 3 | corrupt stream or other codec error |
//! | 4 | local read or destination write error |
//! | 5 | usage error |
//!
//! # Examples
//!
//! ```
//! use cli::run;
//!
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let exit_code = run(["transfer", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(exit_code, 0);
//! assert!(!stdout.is_empty());
//! assert!(stderr.is_empty());
//! ```
//!
//! # See also
//!
//! - `src/bin/transfer.rs` in the workspace root wires [`run_with`] into `main`.

use std::ffi::OsString;
use std::io::Write;

mod command;
mod driver;
mod error;
mod exit_code;
mod frontend;
mod output;
mod progress;

pub use error::CliError;
pub use exit_code::ExitCode;

/// Runs the command and returns its numeric exit code.
pub fn run<I, S, Out, Diag>(arguments: I, stdout: &mut Out, stderr: &mut Diag) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Diag: Write,
{
    frontend::execute(arguments, stdout, stderr).as_i32()
}

/// Runs the command and returns a process exit status for `main`.
pub fn run_with<I, S, Out, Diag>(
    arguments: I,
    stdout: &mut Out,
    stderr: &mut Diag,
) -> std::process::ExitCode
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Diag: Write,
{
    frontend::execute(arguments, stdout, stderr).into()
}
