#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `compress` provides the resumable (de)compression engine used by the
//! streampump transfer pipeline. A [`CodecEngine`] is a pure byte-in/byte-out
//! transform: callers hand it an input slice and an output slice, and the
//! engine reports how much of each it used. No call ever blocks, allocates
//! an output buffer, or requires the whole payload to be resident.
//!
//! # Design
//!
//! The engine is an enum of backend variants rather than a trait object. The
//! zlib backend drives [`flate2`](https://docs.rs/flate2)'s low-level
//! `Compress`/`Decompress` state machines; the optional Zstandard backend
//! drives the raw streaming API of [`zstd`](https://docs.rs/zstd). The
//! [`Transform`] trait captures the contract so orchestrators can stay
//! generic (and tests can substitute stub engines) without dynamic dispatch.
//!
//! # Invariants
//!
//! - `consumed <= input.len()` and `produced <= output.len()` on every call.
//! - [`CodecEngine::total_in`] and [`CodecEngine::total_out`] grow by exactly
//!   the reported `consumed`/`produced`, including on calls that fail.
//! - Once a call reports [`Status::Finished`] or [`Status::Error`] the engine
//!   is terminal.
//!
//! # Errors
//!
//! Failures are reported in-band as [`Status::Error`] carrying a
//! [`CodecError`]. Corrupt input is data, never a panic.
//!
//! # Examples
//!
//! ```
//! use compress::{CodecEngine, EngineParams, Mode, Status};
//!
//! let mut engine = CodecEngine::new(Mode::Compress, EngineParams::default()).unwrap();
//! let mut output = [0u8; 256];
//! let step = engine.transform(b"streaming example payload", &mut output, true);
//! assert_eq!(step.status, Status::Finished);
//! assert_eq!(engine.total_in(), 25);
//!
//! let restored = compress::decompress_to_vec(&output[..step.produced], EngineParams::default()).unwrap();
//! assert_eq!(restored, b"streaming example payload");
//! ```
//!
//! # See also
//!
//! - [`zlib`] for compression levels and quality mapping.
//! - `transfer` for the buffer pump that drives engines against live channels.

pub mod algorithm;
mod buffer;
mod engine;
mod error;
pub mod zlib;
#[cfg(feature = "zstd")]
mod zstd;

pub use buffer::{compress_to_vec, decompress_to_vec};
pub use engine::{CodecEngine, EngineParams, Mode, Status, StepResult, Transform};
pub use error::CodecError;
