#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! crates/logging/src/lib.rs
//!
//! Verbosity handling for the `transfer` tool.
//!
//! The workspace logs through `tracing` macros only; this crate decides which
//! of those events reach the terminal. [`VerbosityConfig::from_verbose_level`]
//! turns a `-v` count into a [`LogLevel`] for the workspace crates, and
//! [`init_tracing`] installs a `tracing-subscriber` formatting layer on
//! standard error behind an `EnvFilter`. Setting `RUST_LOG` replaces the
//! derived directives entirely.
//!
//! | `-v` count | workspace level |
//! |------------|-----------------|
//! | none       | `error`         |
//! | `-v`       | `info`          |
//! | `-vv`      | `debug`         |
//! | `-vvv`     | `trace`         |

mod config;
mod subscriber;

pub use config::{LogLevel, VerbosityConfig, WORKSPACE_TARGETS};
pub use subscriber::{LOG_ENV, build_filter, init_tracing};
