//! Sparse skip index over the chunk chain.
//!
//! Back-only linked traversal costs one hop per chunk, which is fine for
//! short chains but dominates random access once a buffer holds hundreds of
//! chunks. Even-indexed chunks therefore carry a sparse table of
//! back-pointers keyed by exponent: the entry for exponent `k` references
//! the chunk `2^k` promotions earlier. A chunk at promotion index `i`
//! carries an entry for every `k` with `2^k <= i` and `2^k` dividing `i`,
//! so every stride of 2, 4, 8, ... has a pointer somewhere in the chain.
//!
//! Entries are held in descending exponent order: the descent tries the
//! farthest stride first and refines from there.

use super::chunk::ChunkId;
use super::ChunkedBuffer;

/// Minimum promotion index before the descent consults skip tables. Below
/// this, linear traversal beats the table probes.
pub(super) const SKIP_SEARCH_THRESHOLD: u32 = 400;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct SkipEntry {
    pub exponent: u32,
    pub chunk: ChunkId,
}

/// Back-pointer table of one chunk, sorted by descending exponent.
#[derive(Debug)]
pub(super) struct SkipTable {
    entries: Vec<SkipEntry>,
}

impl SkipTable {
    /// Builds a table from entries collected in ascending exponent order.
    pub fn from_ascending(mut entries: Vec<SkipEntry>) -> Self {
        entries.reverse();
        Self { entries }
    }

    pub fn get(&self, exponent: u32) -> Option<ChunkId> {
        self.entries
            .iter()
            .find(|entry| entry.exponent == exponent)
            .map(|entry| entry.chunk)
    }

    /// Entries, farthest stride first.
    pub fn iter(&self) -> impl Iterator<Item = &SkipEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Rewrites entries referencing `from` to reference `to`.
    pub fn retarget(&mut self, from: ChunkId, to: ChunkId) {
        for entry in &mut self.entries {
            if entry.chunk == from {
                entry.chunk = to;
            }
        }
    }
}

impl<T: Copy + Default> ChunkedBuffer<T> {
    /// Rebuilds the head chunk's skip table after its promotion index
    /// changed. Odd indices carry no table.
    pub(super) fn refresh_head_skip(&mut self) {
        let head = self.head;
        let index = self.chunks[head].index;
        if index < 2 || index % 2 != 0 {
            self.chunks[head].skip = None;
            return;
        }
        // The previous even chunk, two chain steps back.
        let prev_even = match self.chunks[head].prev.and_then(|p| self.chunks[p].prev) {
            Some(id) => id,
            None => {
                self.chunks[head].skip = None;
                return;
            }
        };

        let mut entries = Vec::new();
        let mut n = 1u32;
        while (1u64 << n) <= u64::from(index) {
            let stride = 1u32 << n;
            if index % stride == 0 {
                let found = if n == 1 { Some(prev_even) } else { self.copy_pointer(prev_even, n - 1) };
                // Install only exact strides: a chain whose parity was
                // broken by splices yields nothing for this exponent.
                if let Some(chunk) = found {
                    if self.chunks[chunk].index + stride == index {
                        entries.push(SkipEntry { exponent: n, chunk });
                    }
                }
            }
            n += 1;
        }
        self.chunks[head].skip = if entries.is_empty() {
            None
        } else {
            Some(SkipTable::from_ascending(entries))
        };
    }

    /// Rewrites skip entries above `from` that reference `from` so they
    /// reference `to` instead. A split hands the target chunk's promotion
    /// index to the fresh chunk linked below it; entries that recorded a
    /// stride to that index keep it exact by following the handoff.
    pub(super) fn retarget_skip_entries(&mut self, from: ChunkId, to: ChunkId) {
        let mut current = self.head;
        while current != from {
            let prev = self.chunks[current].prev;
            if let Some(table) = &mut self.chunks[current].skip {
                table.retarget(from, to);
            }
            current = prev.expect("split target is on the live chain");
        }
    }

    /// Finds the nearest chunk at or before `from` whose table carries
    /// `exponent` and returns that entry's pointer. Walks the chain two
    /// chunks at a time, degrading to single steps when a splice has broken
    /// parity. Returns None when the chain runs out; a missing entry only
    /// costs descent speed.
    fn copy_pointer(&self, from: ChunkId, exponent: u32) -> Option<ChunkId> {
        let mut current = from;
        loop {
            if let Some(table) = &self.chunks[current].skip {
                if let Some(chunk) = table.get(exponent) {
                    return Some(chunk);
                }
            }
            let one_back = self.chunks[current].prev?;
            current = self.chunks[one_back].prev.unwrap_or(one_back);
        }
    }

    /// Locates the chunk whose logical range contains `target`.
    ///
    /// Starting at the head, while the current chunk begins after `target`,
    /// either steps to the previous chunk or, above the threshold, takes the
    /// largest stride whose referenced chunk still begins after `target`.
    /// Stride targets are guarded by offset alone, so stale pointers left
    /// behind by splices are harmless: a spliced-out slot only ever routes
    /// the walk further back along its surviving prev link.
    pub(super) fn find_chunk(&self, target: usize) -> ChunkId {
        let mut current = self.head;
        while self.chunks[current].offset > target {
            let chunk = &self.chunks[current];
            let table = match &chunk.skip {
                Some(table) if chunk.index > SKIP_SEARCH_THRESHOLD => table,
                _ => {
                    current = chunk.prev.expect("chunk chain ended above the search index");
                    continue;
                }
            };
            let hop = table
                .iter()
                .find(|entry| self.chunks[entry.chunk].offset > target)
                .map(|entry| entry.chunk);
            current = match hop {
                Some(id) => id,
                None => chunk.prev.expect("chunk chain ended above the search index"),
            };
        }
        current
    }
}
