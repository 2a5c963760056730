//! The single fixed-capacity buffer shared by the read and write sides of the
//! pump.
//!
//! The buffer holds two regions. The *source* region carries bytes read from
//! the transfer source that the engine has not consumed yet; it always sits
//! before the *dest* region, which carries engine output that has not reached
//! the destination yet. Neither region ever grows past the capacity, and the
//! boundary between them moves every step according to
//! [`SharedBuffer::output_reserve`].

use std::ops::Range;

/// Smallest usable capacity: one input byte and one output byte.
pub const MIN_CAPACITY: usize = 2;

/// Fixed-capacity split buffer.
pub struct SharedBuffer {
    data: Box<[u8]>,
    source: Range<usize>,
    dest: Range<usize>,
}

impl SharedBuffer {
    /// Allocates a buffer of `capacity` bytes, clamped up to [`MIN_CAPACITY`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            source: 0..0,
            dest: 0..0,
        }
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes waiting to be fed to the engine.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.data[self.source.clone()]
    }

    /// Bytes waiting to be written to the destination.
    #[must_use]
    pub fn dest(&self) -> &[u8] {
        &self.data[self.dest.clone()]
    }

    /// Number of unconsumed source bytes.
    #[must_use]
    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Number of unflushed output bytes.
    #[must_use]
    pub fn dest_len(&self) -> usize {
        self.dest.len()
    }

    /// How many bytes the output side should keep free, given the engine's
    /// observed output/input ratio `total_out / total_in`.
    ///
    /// With ratio `r` the reserve is `ceil(N * r / (1 + r))`, which gives the
    /// input and output regions room in proportion to what the engine turns
    /// one into. Before the engine has consumed anything the ratio is taken
    /// as 1. The result is clamped to `1..=N - 1`.
    #[must_use]
    pub fn output_reserve(&self, total_in: u64, total_out: u64) -> usize {
        let capacity = self.capacity();
        let (numerator, denominator) = if total_in == 0 {
            (1u128, 2u128)
        } else {
            (u128::from(total_out), u128::from(total_in) + u128::from(total_out))
        };
        let scaled = (capacity as u128 * numerator).div_ceil(denominator);
        let reserve = usize::try_from(scaled).unwrap_or(capacity);
        reserve.clamp(1, capacity - 1)
    }

    /// Space available for a source read when `reserve` bytes are kept for
    /// output. Compacts the source region to the front when that makes room.
    pub fn read_space(&mut self, reserve: usize) -> usize {
        let limit = self.read_limit(reserve);
        if self.source.end < limit {
            return limit - self.source.end;
        }
        if self.source.start > 0 {
            self.compact_source();
        }
        limit.saturating_sub(self.source.end)
    }

    /// Writable tail of the source region, at most `max` bytes long. Bytes
    /// written there become source bytes through [`commit_read`](Self::commit_read).
    pub fn read_slot(&mut self, max: usize) -> &mut [u8] {
        let start = self.source.end;
        &mut self.data[start..start + max]
    }

    /// Appends `n` freshly read bytes to the source region.
    pub fn commit_read(&mut self, n: usize) {
        debug_assert!(self.source.end + n <= self.capacity());
        self.source.end += n;
    }

    /// Splits the buffer into the unconsumed input and the free output area
    /// for one engine call. The output slice is empty when the dest region
    /// already reaches the end of the buffer.
    pub fn engine_slices(&mut self, reserve: usize) -> (&[u8], &mut [u8]) {
        if self.dest.is_empty() {
            let start = self
                .source
                .end
                .max(self.capacity().saturating_sub(reserve));
            self.dest = start..start;
        }
        let output_start = self.dest.end;
        let (head, tail) = self.data.split_at_mut(output_start);
        (&head[self.source.clone()], tail)
    }

    /// Records an engine call that consumed `consumed` input bytes and
    /// produced `produced` output bytes.
    pub fn commit_engine(&mut self, consumed: usize, produced: usize) {
        debug_assert!(consumed <= self.source.len());
        debug_assert!(self.dest.end + produced <= self.capacity());
        self.source.start += consumed;
        if self.source.is_empty() {
            self.source = 0..0;
        }
        self.dest.end += produced;
    }

    /// Drops `n` bytes from the front of the dest region after they were written.
    pub fn commit_write(&mut self, n: usize) {
        debug_assert!(n <= self.dest.len());
        self.dest.start += n;
        if self.dest.is_empty() {
            self.dest = self.source.end..self.source.end;
        }
    }

    /// `true` when the engine has somewhere to put output right now.
    #[must_use]
    pub fn has_output_space(&self) -> bool {
        self.dest.is_empty() || self.dest.end < self.capacity()
    }

    fn read_limit(&self, reserve: usize) -> usize {
        let limit = self.capacity() - reserve.clamp(1, self.capacity() - 1);
        if self.dest.is_empty() {
            limit
        } else {
            limit.min(self.dest.start)
        }
    }

    fn compact_source(&mut self) {
        let len = self.source.len();
        self.data.copy_within(self.source.clone(), 0);
        self.source = 0..len;
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("capacity", &self.capacity())
            .field("source", &self.source)
            .field("dest", &self.dest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped_to_two() {
        assert_eq!(SharedBuffer::new(0).capacity(), 2);
        assert_eq!(SharedBuffer::new(1).capacity(), 2);
        assert_eq!(SharedBuffer::new(7).capacity(), 7);
    }

    #[test]
    fn reserve_follows_observed_ratio() {
        let buffer = SharedBuffer::new(1000);
        assert_eq!(buffer.output_reserve(0, 0), 500);
        // 4:1 compression keeps a fifth for output.
        assert_eq!(buffer.output_reserve(400, 100), 200);
        // 1:3 expansion keeps three quarters for output.
        assert_eq!(buffer.output_reserve(100, 300), 750);
        assert_eq!(buffer.output_reserve(100, 0), 1);
        assert_eq!(buffer.output_reserve(1, u64::MAX), 999);
    }

    #[test]
    fn reads_stop_at_the_reserve() {
        let mut buffer = SharedBuffer::new(10);
        assert_eq!(buffer.read_space(4), 6);
        buffer.read_slot(6).copy_from_slice(b"abcdef");
        buffer.commit_read(6);
        assert_eq!(buffer.read_space(4), 0);
        assert_eq!(buffer.source(), b"abcdef");
    }

    #[test]
    fn engine_output_lands_after_the_source() {
        let mut buffer = SharedBuffer::new(10);
        buffer.read_slot(3).copy_from_slice(b"xyz");
        buffer.commit_read(3);

        let (input, output) = buffer.engine_slices(5);
        assert_eq!(input, b"xyz");
        assert_eq!(output.len(), 5);
        output[..2].copy_from_slice(b"12");
        buffer.commit_engine(1, 2);

        assert_eq!(buffer.source(), b"yz");
        assert_eq!(buffer.dest(), b"12");
    }

    #[test]
    fn partial_writes_keep_the_remaining_output() {
        let mut buffer = SharedBuffer::new(8);
        buffer.read_slot(2).copy_from_slice(b"ab");
        buffer.commit_read(2);
        let (_, output) = buffer.engine_slices(4);
        output[..4].copy_from_slice(b"WXYZ");
        buffer.commit_engine(2, 4);
        assert!(!buffer.has_output_space());

        buffer.commit_write(1);
        assert_eq!(buffer.dest(), b"XYZ");
        // Reads may not run into pending output.
        assert_eq!(buffer.read_space(4), 4);

        buffer.commit_write(3);
        assert_eq!(buffer.dest_len(), 0);
        assert!(buffer.has_output_space());
    }

    #[test]
    fn consumed_source_is_compacted_before_reading() {
        let mut buffer = SharedBuffer::new(6);
        buffer.read_slot(3).copy_from_slice(b"abc");
        buffer.commit_read(3);
        let _ = buffer.engine_slices(3);
        buffer.commit_engine(2, 0);
        assert_eq!(buffer.source(), b"c");
        assert_eq!(buffer.read_space(3), 2);
        buffer.read_slot(2).copy_from_slice(b"de");
        buffer.commit_read(2);
        assert_eq!(buffer.source(), b"cde");
    }

    #[test]
    fn minimum_buffer_still_moves_bytes() {
        let mut buffer = SharedBuffer::new(1);
        let reserve = buffer.output_reserve(0, 0);
        assert_eq!(reserve, 1);
        assert_eq!(buffer.read_space(reserve), 1);
        buffer.read_slot(1)[0] = b'q';
        buffer.commit_read(1);
        let (input, output) = buffer.engine_slices(reserve);
        assert_eq!(input, b"q");
        assert_eq!(output.len(), 1);
    }
}
