//! Per-stream reorder buffer (§5: "consumers MUST reorder using a small
//! buffer keyed by the expected next number and drain contiguous prefixes";
//! §9: "Cap the map size; overflow = stream error").
//!
//! One instance guards exactly one `(requestId, stream-kind)` sequence space —
//! exec stdout, exec stderr, a port-forward inner id's data stream, and so on
//! each get their own.

use std::collections::BTreeMap;
use thiserror::Error;

/// A buffer default suited to exec/log/port-forward chunk streams: generous
/// enough to absorb ordinary reordering, small enough that a peer cannot
/// stall a reader by hoarding memory behind one missing chunk.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Errors raised while feeding a `ReorderBuffer`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReorderError {
    /// Accepting this chunk would hold more than `max_pending` chunks behind a gap.
    #[error("reorder buffer overflow: {pending} chunks already pending, capacity {max_pending}")]
    Overflow {
        /// How many chunks were already pending when the offending chunk arrived.
        pending: usize,
        /// The buffer's configured capacity.
        max_pending: usize,
    },
}

/// Buffers out-of-order chunks keyed by sequence number and yields them in
/// order as the gaps fill in.
pub struct ReorderBuffer<T> {
    next_expected: u64,
    pending: BTreeMap<u64, T>,
    max_pending: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_PENDING)
    }
}

impl<T> ReorderBuffer<T> {
    /// Creates a buffer expecting sequence number `0` first, capped at `DEFAULT_MAX_PENDING`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer expecting sequence number `0` first, holding back at most `max_pending` chunks.
    pub fn with_capacity(max_pending: usize) -> Self {
        Self {
            next_expected: 0,
            pending: BTreeMap::new(),
            max_pending,
        }
    }

    /// Accepts a chunk at `sequence_number`, returning every chunk now
    /// available in order (possibly more than one, possibly none if this
    /// chunk itself arrived ahead of a gap).
    ///
    /// Rejects the chunk with `ReorderError::Overflow` rather than growing
    /// past `max_pending` held-back chunks (§9).
    pub fn accept(&mut self, sequence_number: u64, chunk: T) -> Result<Vec<T>, ReorderError> {
        if sequence_number < self.next_expected {
            // Stale duplicate — transport-level retry or a reconnect replay; drop it.
            return Ok(Vec::new());
        }
        if !self.pending.contains_key(&sequence_number) && self.pending.len() >= self.max_pending {
            return Err(ReorderError::Overflow {
                pending: self.pending.len(),
                max_pending: self.max_pending,
            });
        }
        self.pending.insert(sequence_number, chunk);
        let mut drained = Vec::new();
        while let Some(chunk) = self.pending.remove(&self.next_expected) {
            drained.push(chunk);
            self.next_expected += 1;
        }
        Ok(drained)
    }

    /// The next sequence number this buffer has not yet released.
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// How many chunks are being held back waiting for a gap to fill.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order_when_chunks_arrive_in_order() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(buf.accept(0, "a").unwrap(), vec!["a"]);
        assert_eq!(buf.accept(1, "b").unwrap(), vec!["b"]);
    }

    #[test]
    fn buffers_out_of_order_chunks_until_the_gap_fills() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(buf.accept(2, "c").unwrap(), Vec::<&str>::new());
        assert_eq!(buf.accept(1, "b").unwrap(), Vec::<&str>::new());
        assert_eq!(buf.pending_count(), 2);
        assert_eq!(buf.accept(0, "a").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(buf.pending_count(), 0);
    }

    #[test]
    fn drops_stale_duplicates() {
        let mut buf = ReorderBuffer::new();
        buf.accept(0, "a").unwrap();
        assert_eq!(buf.accept(0, "a-again").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn rejects_a_chunk_past_capacity_as_an_overflow_error() {
        let mut buf = ReorderBuffer::with_capacity(2);
        buf.accept(5, "a").unwrap();
        buf.accept(6, "b").unwrap();
        let err = buf.accept(7, "c").unwrap_err();
        assert_eq!(err, ReorderError::Overflow { pending: 2, max_pending: 2 });
    }

    #[test]
    fn a_duplicate_of_an_already_pending_sequence_does_not_count_against_capacity() {
        let mut buf = ReorderBuffer::with_capacity(1);
        buf.accept(5, "a").unwrap();
        // Re-delivering the same pending sequence number overwrites in place, not growing the map.
        assert!(buf.accept(5, "a-again").is_ok());
    }
}
