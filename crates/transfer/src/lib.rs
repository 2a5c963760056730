#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! crates/transfer/src/lib.rs
//!
//! Buffer pump for streaming fetch-and-(de)compress transfers.
//!
//! A [`BufferPump`] cycles bytes from a
//! [`TransferSource`](transport::TransferSource) through a
//! [`Transform`](compress::Transform) into a [`Destination`] using one
//! fixed-capacity [`SharedBuffer`]. Each call to [`BufferPump::step`] does at
//! most one source poll, one engine call and one destination write, so the
//! caller's loop stays responsive no matter how large the resource is.
//!
//! # Step rules
//!
//! 1. Poll the source when it is not complete and the buffer has read space
//!    left after the output reserve.
//! 2. Call the engine when source bytes are pending, when the source is
//!    complete (the finish hint), or when the engine still holds output.
//! 3. Write pending output to the destination. Partial writes and
//!    `WouldBlock` are retried on the next step.
//! 4. Report [`PumpResult::Complete`] once the engine finished and every
//!    output byte was written.
//!
//! An engine call that returns without consuming or producing anything fails
//! the transfer with [`CodecError::NoProgress`](compress::CodecError::NoProgress)
//! in the same step. Resources with no bytes fail with
//! [`TransferError::EmptyResource`] before the engine is ever called.
//! Terminal results repeat on every later step.
//!
//! # Buffer split
//!
//! The read budget is recomputed every step from the engine's observed
//! output/input ratio (see [`SharedBuffer::output_reserve`]), so a compressor
//! gets most of the buffer for input and a decompressor most of it for
//! output. The capacity is clamped to at least two bytes.
//!
//! # Example
//!
//! ```
//! use compress::{CodecEngine, EngineParams, Mode};
//! use transfer::{BufferPump, PumpResult, Ramfile};
//! use transport::ChannelSource;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("input.txt");
//! std::fs::write(&path, b"pumped through a tiny buffer").unwrap();
//!
//! let source = ChannelSource::open_file(&path).unwrap();
//! let engine = CodecEngine::new(Mode::Compress, EngineParams::default()).unwrap();
//! let mut pump = BufferPump::new(source, engine, Ramfile::new(), 16);
//! while !pump.step().is_terminal() {}
//! assert_eq!(pump.step(), PumpResult::Complete);
//!
//! let (_, _, compressed) = pump.into_parts();
//! let plain = compress::decompress_to_vec(compressed.as_bytes(), EngineParams::default()).unwrap();
//! assert_eq!(plain, b"pumped through a tiny buffer");
//! ```

mod buffer;
mod config;
mod destination;
mod error;
mod pump;

pub use buffer::{MIN_CAPACITY, SharedBuffer};
pub use config::{DEFAULT_BUFFER_CAPACITY, DEFAULT_QUALITY, TransferConfig, TransferConfigBuilder};
pub use destination::{Destination, FileDestination, Ramfile, WriteMode};
pub use error::{FailureClass, TransferError};
pub use pump::{BufferPump, PumpResult, PumpStats};
