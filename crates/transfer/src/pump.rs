//! The [`BufferPump`] state machine.

use compress::{CodecEngine, CodecError, Status, Transform};
use tracing::{debug, trace, warn};
use transport::{TransferEvent, TransferSource};

use crate::buffer::SharedBuffer;
use crate::destination::Destination;
use crate::error::TransferError;

/// Outcome of one [`BufferPump::step`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PumpResult {
    /// Bytes moved somewhere; call again soon.
    Progressed,
    /// Nothing moved; the source or destination is not ready.
    WaitingOnChannel,
    /// Every output byte reached the destination.
    Complete,
    /// The transfer stopped. Repeated on every later step.
    Failed(TransferError),
}

impl PumpResult {
    /// Returns `true` for [`Complete`](Self::Complete) and
    /// [`Failed`](Self::Failed).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

/// Counters describing a pump's work so far.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PumpStats {
    /// Calls to [`BufferPump::step`].
    pub steps: u64,
    /// Bytes taken from the source.
    pub bytes_read: u64,
    /// Bytes accepted by the destination.
    pub bytes_written: u64,
    /// Engine calls made.
    pub engine_calls: u64,
    /// Bytes the engine consumed.
    pub engine_in: u64,
    /// Bytes the engine produced.
    pub engine_out: u64,
}

/// Moves bytes from a [`TransferSource`] through a [`Transform`] into a
/// [`Destination`], one bounded step at a time.
///
/// All three share a single [`SharedBuffer`]; the pump never allocates after
/// construction and never blocks.
pub struct BufferPump<S, D, E = CodecEngine> {
    source: S,
    engine: E,
    destination: D,
    buffer: SharedBuffer,
    source_done: bool,
    pending_output: bool,
    engine_finished: bool,
    outcome: Option<PumpResult>,
    stats: PumpStats,
}

impl<S, D, E> BufferPump<S, D, E>
where
    S: TransferSource,
    D: Destination,
    E: Transform,
{
    /// Builds a pump over a buffer of `capacity` bytes (clamped to at least two).
    pub fn new(source: S, engine: E, destination: D, capacity: usize) -> Self {
        let buffer = SharedBuffer::new(capacity);
        debug!(capacity = buffer.capacity(), "pump created");
        Self {
            source,
            engine,
            destination,
            buffer,
            source_done: false,
            pending_output: false,
            engine_finished: false,
            outcome: None,
            stats: PumpStats::default(),
        }
    }

    /// Runs one read / transform / write cycle.
    pub fn step(&mut self) -> PumpResult {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        if self.source.is_cancelled() {
            return self.fail(TransferError::Cancelled);
        }
        if self.stats.steps == 0 && self.source.expected_length() == Some(0) {
            return self.fail(TransferError::EmptyResource);
        }
        self.stats.steps += 1;

        let reserve = self
            .buffer
            .output_reserve(self.engine.total_in(), self.engine.total_out());
        let mut moved = false;

        if !self.source_done && !self.engine_finished {
            match self.read(reserve) {
                Ok(read) => moved |= read,
                Err(error) => return self.fail(error),
            }
        }

        let finish_hint = self.source_done;
        let wants_engine =
            self.buffer.source_len() > 0 || finish_hint || self.pending_output;
        if wants_engine && !self.engine_finished && self.buffer.has_output_space() {
            match self.run_engine(reserve, finish_hint) {
                Ok(progressed) => moved |= progressed,
                Err(error) => return self.fail(error),
            }
        }

        if self.buffer.dest_len() > 0 {
            match self.flush() {
                Ok(written) => moved |= written,
                Err(error) => return self.fail(error),
            }
        }

        trace!(
            step = self.stats.steps,
            source = self.buffer.source_len(),
            dest = self.buffer.dest_len(),
            moved,
            "pump step"
        );

        if self.engine_finished && self.buffer.dest_len() == 0 {
            if !self.source_done {
                debug!(read = self.stats.bytes_read, "engine finished before the source; releasing it");
                self.source.release();
            }
            debug!(
                read = self.stats.bytes_read,
                written = self.stats.bytes_written,
                "pump complete"
            );
            self.outcome = Some(PumpResult::Complete);
            return PumpResult::Complete;
        }
        if moved {
            PumpResult::Progressed
        } else {
            PumpResult::WaitingOnChannel
        }
    }

    /// Cancels the source. The next [`step`](Self::step) reports
    /// [`TransferError::Cancelled`] unless the pump already finished.
    pub fn cancel(&mut self) {
        debug!("pump cancelled");
        self.source.cancel();
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> &PumpStats {
        &self.stats
    }

    /// The source being drained.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source, e.g. to disconnect it from outside.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The engine being driven.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The destination receiving output.
    #[must_use]
    pub const fn destination(&self) -> &D {
        &self.destination
    }

    /// Capacity of the shared buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Consumes the pump, returning its parts.
    pub fn into_parts(self) -> (S, E, D) {
        (self.source, self.engine, self.destination)
    }

    fn read(&mut self, reserve: usize) -> Result<bool, TransferError> {
        let space = self.buffer.read_space(reserve);
        if space == 0 {
            return Ok(false);
        }
        match self.source.poll(self.buffer.read_slot(space)) {
            TransferEvent::WouldBlock => Ok(false),
            TransferEvent::DataAvailable(n) => {
                let n = n.min(space);
                self.buffer.commit_read(n);
                self.stats.bytes_read += n as u64;
                Ok(n > 0)
            }
            TransferEvent::Complete => {
                if self.stats.bytes_read == 0 {
                    return Err(TransferError::EmptyResource);
                }
                debug!(bytes = self.stats.bytes_read, "source complete");
                self.source_done = true;
                Ok(false)
            }
            TransferEvent::Failed(reason) => Err(reason.into()),
        }
    }

    fn run_engine(&mut self, reserve: usize, finish_hint: bool) -> Result<bool, TransferError> {
        let pending_only = self.buffer.source_len() == 0 && !finish_hint;
        let (input, output) = self.buffer.engine_slices(reserve);
        let step = self.engine.transform(input, output, finish_hint);
        let progressed = step.made_progress();

        self.buffer.commit_engine(step.consumed, step.produced);
        self.stats.engine_calls += 1;
        self.stats.engine_in += step.consumed as u64;
        self.stats.engine_out += step.produced as u64;

        match step.status {
            Status::Error(error) => Err(error.into()),
            Status::Finished => {
                debug!(
                    total_in = self.engine.total_in(),
                    total_out = self.engine.total_out(),
                    "engine finished"
                );
                self.engine_finished = true;
                self.pending_output = false;
                Ok(progressed)
            }
            Status::Continue | Status::NeedMoreOutputSpace if !progressed && !pending_only => {
                Err(CodecError::NoProgress.into())
            }
            Status::NeedMoreOutputSpace => {
                self.pending_output = true;
                Ok(progressed)
            }
            Status::Continue => {
                self.pending_output = false;
                Ok(progressed)
            }
        }
    }

    fn flush(&mut self) -> Result<bool, TransferError> {
        match self.destination.write(self.buffer.dest()) {
            Ok(0) => Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into()),
            Ok(n) => {
                let n = n.min(self.buffer.dest_len());
                self.buffer.commit_write(n);
                self.stats.bytes_written += n as u64;
                Ok(true)
            }
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                ) =>
            {
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn fail(&mut self, error: TransferError) -> PumpResult {
        warn!(%error, class = error.class().label(), "transfer failed");
        if !self.source.is_cancelled() {
            self.source.cancel();
        }
        let result = PumpResult::Failed(error);
        self.outcome = Some(result.clone());
        result
    }
}

impl<S, D, E> std::fmt::Debug for BufferPump<S, D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPump")
            .field("buffer", &self.buffer)
            .field("source_done", &self.source_done)
            .field("pending_output", &self.pending_output)
            .field("engine_finished", &self.engine_finished)
            .field("outcome", &self.outcome)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
