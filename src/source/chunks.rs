use std::ops::RangeInclusive;

use alloy::primitives::BlockNumber;

/// Consecutive sub-ranges of an inclusive block range, each at most `chunk_size` blocks long,
/// oldest first.
#[derive(Debug, Clone)]
pub(crate) struct BlockChunks {
    /// Start of the next chunk; `None` once the range is used up.
    next_start: Option<BlockNumber>,
    end: BlockNumber,
    chunk_size: u64,
}

impl BlockChunks {
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    pub(crate) fn new(blocks: RangeInclusive<BlockNumber>, chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        let (start, end) = blocks.into_inner();
        Self { next_start: (start <= end).then_some(start), end, chunk_size }
    }

    /// Chunks not yet yielded.
    pub(crate) fn remaining(&self) -> u64 {
        self.next_start.map_or(0, |start| (self.end - start) / self.chunk_size + 1)
    }
}

impl Iterator for BlockChunks {
    type Item = RangeInclusive<BlockNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let end = start.saturating_add(self.chunk_size - 1).min(self.end);
        self.next_start = end.checked_add(1).filter(|next| *next <= self.end);
        Some(start..=end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}
