//! Structural edits: insert, remove and replace.
//!
//! These operations splice the chunk chain rather than rebuilding it. The
//! offsets of every chunk above the edited region shift first, then the
//! region itself is patched — either in place when the target chunk has
//! room, or by linking a fresh chunk into the chain. Spliced-out chunks
//! release their storage but keep their arena slot, so back-pointers that
//! still reference them stay resolvable.

use tracing::trace;

use crate::error::{Error, Result};
use crate::{errinput, errrange};

use super::chunk::{new_backing, Chunk};
use super::{ChunkedBuffer, DEFAULT_CAPACITY};

impl<T: Copy + Default> ChunkedBuffer<T> {
    /// Inserts `values` at logical `index`.
    pub fn insert_slice(&mut self, index: usize, values: &[T]) -> Result<()> {
        self.insert_repeat(index, values, 1)
    }

    /// Inserts `count` copies of `values` at logical `index`.
    pub fn insert_repeat(&mut self, index: usize, values: &[T], count: usize) -> Result<()> {
        if index > self.len() {
            return errrange!("insert index {} beyond length {}", index, self.len());
        }
        let total = values.len().checked_mul(count).unwrap_or(usize::MAX);
        if total == 0 {
            return Ok(());
        }
        if total > self.max_capacity - self.len() {
            return Err(Error::CapacityExceeded {
                requested: self.len().saturating_add(total),
                max: self.max_capacity,
            });
        }
        let (chunk, mut at) = self.make_room(index, total, false);
        let target = &mut self.chunks[chunk];
        for _ in 0..count {
            target.data[at..at + values.len()].copy_from_slice(values);
            at += values.len();
        }
        Ok(())
    }

    /// Removes `length` elements starting at `start`. Removing the entire
    /// sequence resets the buffer to a single empty head chunk on the
    /// head's backing array.
    pub fn remove_range(&mut self, start: usize, length: usize) -> Result<()> {
        let end = start.checked_add(length).unwrap_or(usize::MAX);
        if end > self.len() {
            return errrange!("remove range {}..{} beyond length {}", start, end, self.len());
        }
        if length == 0 {
            return Ok(());
        }
        if start == 0 && length == self.len() {
            self.reset();
            return Ok(());
        }
        self.remove_inner(start, length);
        Ok(())
    }

    /// Replaces every occurrence of the value `old` with `new` across the
    /// whole sequence.
    pub fn replace_value(&mut self, old: T, new: T) -> Result<()>
    where
        T: PartialEq,
    {
        let len = self.len();
        self.replace_value_in(old, new, 0, len)
    }

    /// Replaces every occurrence of the value `old` with `new` within
    /// `[start, start + count)`, walking the intersecting chunks backward
    /// and substituting in place.
    pub fn replace_value_in(&mut self, old: T, new: T, start: usize, count: usize) -> Result<()>
    where
        T: PartialEq,
    {
        let end = start.checked_add(count).unwrap_or(usize::MAX);
        if end > self.len() {
            return errrange!("replace range {}..{} beyond length {}", start, end, self.len());
        }
        if count == 0 {
            return Ok(());
        }
        let mut current = self.find_chunk(end - 1);
        loop {
            let chunk = &mut self.chunks[current];
            let lo = start.max(chunk.offset) - chunk.offset;
            let hi = end.min(chunk.end()) - chunk.offset;
            if lo < hi {
                for value in &mut chunk.data[lo..hi] {
                    if *value == old {
                        *value = new;
                    }
                }
            }
            if chunk.offset <= start {
                return Ok(());
            }
            current = chunk.prev.expect("chunk chain ended inside the replace range");
        }
    }

    /// Replaces each non-overlapping occurrence of the sequence `old` with
    /// `new` across the whole sequence. Returns the replacement count.
    pub fn replace(&mut self, old: &[T], new: &[T]) -> Result<usize>
    where
        T: PartialEq,
    {
        let len = self.len();
        self.replace_in(old, new, 0, len)
    }

    /// Replaces each non-overlapping occurrence of `old` within
    /// `[start, start + count)` with `new`. Matches are collected left to
    /// right, batched per chunk, and the batches applied from the highest
    /// addresses down so pending positions stay valid. Returns the
    /// replacement count.
    pub fn replace_in(&mut self, old: &[T], new: &[T], start: usize, count: usize) -> Result<usize>
    where
        T: PartialEq,
    {
        if old.is_empty() {
            return errinput!("replace pattern is empty");
        }
        let end = start.checked_add(count).unwrap_or(usize::MAX);
        if end > self.len() {
            return errrange!("replace range {}..{} beyond length {}", start, end, self.len());
        }

        let mut matches = Vec::new();
        let mut i = start;
        while i + old.len() <= end {
            if self.matches_at(i, old) {
                matches.push(i);
                i += old.len();
            } else {
                i += 1;
            }
        }
        if matches.is_empty() {
            return Ok(0);
        }
        if new.len() > old.len() {
            let growth = (new.len() - old.len()) * matches.len();
            if growth > self.max_capacity - self.len() {
                return Err(Error::CapacityExceeded {
                    requested: self.len().saturating_add(growth),
                    max: self.max_capacity,
                });
            }
        }

        // Batch consecutive matches that start in the same chunk.
        let mut batches: Vec<Vec<usize>> = Vec::new();
        let mut last_chunk = None;
        for &position in &matches {
            let chunk = self.find_chunk(position);
            if last_chunk != Some(chunk) {
                batches.push(Vec::new());
                last_chunk = Some(chunk);
            }
            batches.last_mut().expect("batch was just pushed").push(position);
        }
        for batch in batches.iter().rev() {
            self.replace_batch(batch, old.len(), new);
        }
        Ok(matches.len())
    }

    /// True when the live elements at `at` start with `pattern`; false on
    /// the first mismatch. The caller guarantees the range is live.
    fn matches_at(&self, at: usize, pattern: &[T]) -> bool
    where
        T: PartialEq,
    {
        let mut pos = at;
        let mut matched = 0;
        while matched < pattern.len() {
            let id = self.find_chunk(pos);
            let chunk = &self.chunks[id];
            let lo = pos - chunk.offset;
            let take = (chunk.len - lo).min(pattern.len() - matched);
            debug_assert!(take > 0, "empty chunk inside a live range");
            if chunk.data[lo..lo + take] != pattern[matched..matched + take] {
                return false;
            }
            matched += take;
            pos += take;
        }
        true
    }

    /// Applies one batch of replacements whose match starts share a chunk.
    ///
    /// Same-size replacements overwrite in place. Growing replacements open
    /// the net gap at the batch's end first, then slide matches and the
    /// runs between them back to front, so every copy lands ahead of its
    /// source. Shrinking replacements slide front to back and reclaim the
    /// trailing hole with a single remove.
    fn replace_batch(&mut self, positions: &[usize], old_len: usize, new: &[T]) {
        let m = positions.len();
        if new.len() == old_len {
            for &position in positions {
                self.write_at(position, new).expect("batch positions are live");
            }
            return;
        }
        let region_end = positions[m - 1] + old_len;
        if new.len() > old_len {
            let per = new.len() - old_len;
            self.make_room(region_end, per * m, true);
            for i in (0..m).rev() {
                let gap_src = positions[i] + old_len;
                let gap_end = if i + 1 < m { positions[i + 1] } else { region_end };
                if gap_end > gap_src {
                    let run = self.to_vec_range(gap_src, gap_end - gap_src).expect("run is live");
                    self.write_at(gap_src + (i + 1) * per, &run).expect("shifted run is live");
                }
                self.write_at(positions[i] + i * per, new).expect("target is live");
            }
        } else {
            let per = old_len - new.len();
            for i in 0..m {
                self.write_at(positions[i] - i * per, new).expect("target is live");
                let gap_src = positions[i] + old_len;
                let gap_end = if i + 1 < m { positions[i + 1] } else { region_end };
                if gap_end > gap_src {
                    let run = self.to_vec_range(gap_src, gap_end - gap_src).expect("run is live");
                    self.write_at(gap_src - (i + 1) * per, &run).expect("shifted run is live");
                }
            }
            self.remove_inner(region_end - per * m, per * m);
        }
    }

    /// Opens a `count`-element gap at logical `index` and returns the chunk
    /// and in-chunk position of its first slot. Offsets above the gap shift
    /// first; the gap content is unspecified and must be overwritten by the
    /// caller. `dont_move_following` forces the split strategy even when
    /// the target chunk could shift its own tail.
    ///
    /// The caller has already checked capacity.
    pub(super) fn make_room(
        &mut self,
        index: usize,
        count: usize,
        dont_move_following: bool,
    ) -> (usize, usize) {
        debug_assert!(count > 0 && index <= self.len());
        let mut current = self.head;
        while self.chunks[current].offset > index {
            self.chunks[current].offset += count;
            current = self.chunks[current].prev.expect("chunk chain ended above the gap index");
        }
        let target = current;
        let at = index - self.chunks[target].offset;

        let chunk = &mut self.chunks[target];
        if !dont_move_following
            && chunk.len <= DEFAULT_CAPACITY * 2
            && chunk.capacity() - chunk.len >= count
        {
            chunk.data.copy_within(at..chunk.len, at + count);
            chunk.len += count;
            return (target, at);
        }

        // Split: a fresh chunk linked before the target takes the target's
        // head portion plus the gap; the target keeps its tail and moves up.
        // The handoff mirrors a promotion: the fresh chunk inherits the
        // target's promotion index and skip table, the target takes the next
        // index, and entries elsewhere that pointed at the target follow its
        // old index to the fresh chunk so their strides stay exact.
        let fresh = {
            let chunk = &self.chunks[target];
            let mut data = new_backing((at + count).max(DEFAULT_CAPACITY));
            data[..at].copy_from_slice(&chunk.data[..at]);
            Chunk {
                data,
                len: at + count,
                offset: chunk.offset,
                index: chunk.index,
                prev: chunk.prev,
                skip: None,
            }
        };
        let fresh_id = self.chunks.len();
        self.chunks.push(fresh);
        let table = self.chunks[target].skip.take();
        self.chunks[fresh_id].skip = table;
        let chunk = &mut self.chunks[target];
        chunk.data.copy_within(at..chunk.len, 0);
        chunk.len -= at;
        chunk.offset = index + count;
        chunk.prev = Some(fresh_id);
        self.chunks[target].index += 1;
        if self.skip_index {
            self.retarget_skip_entries(target, fresh_id);
            if target == self.head {
                self.refresh_head_skip();
            }
        }
        trace!(index, count, "split a chunk to open a gap");
        (fresh_id, at)
    }

    /// Drops every chunk and restarts on the head's backing array.
    fn reset(&mut self) {
        let data = std::mem::replace(&mut self.chunks[self.head].data, new_backing(0));
        self.chunks.clear();
        self.chunks.push(Chunk { data, len: 0, offset: 0, index: 0, prev: None, skip: None });
        self.head = 0;
        trace!("reset to a single empty chunk");
    }

    /// Removes `[start, start + count)`, splicing out any chunks that fall
    /// entirely inside the span.
    pub(super) fn remove_inner(&mut self, start: usize, count: usize) {
        let end = start + count;

        // Everything above the removed span moves down.
        let mut current = self.head;
        while self.chunks[current].offset > end {
            self.chunks[current].offset -= count;
            current = self.chunks[current].prev.expect("chunk chain ended above the removed span");
        }
        let end_chunk = current;
        while self.chunks[current].offset > start {
            current = self.chunks[current].prev.expect("chunk chain ended above the removed span");
        }
        let start_chunk = current;

        if start_chunk == end_chunk {
            let chunk = &mut self.chunks[start_chunk];
            let lo = start - chunk.offset;
            let hi = end - chunk.offset;
            chunk.data.copy_within(hi..chunk.len, lo);
            chunk.len -= count;
            return;
        }

        // Truncate the start chunk at the cut, drop the end chunk's prefix
        // inside the span, and splice out everything in between.
        let keep = start - self.chunks[start_chunk].offset;
        self.chunks[start_chunk].len = keep;
        {
            let chunk = &mut self.chunks[end_chunk];
            let cut = end - chunk.offset;
            chunk.data.copy_within(cut..chunk.len, 0);
            chunk.len -= cut;
            chunk.offset = start;
        }
        let mut doomed = self.chunks[end_chunk].prev;
        while let Some(id) = doomed {
            if id == start_chunk {
                break;
            }
            doomed = self.chunks[id].prev;
            self.chunks[id].release();
            trace!(chunk = id, "spliced a chunk out of the chain");
        }
        if keep == 0 {
            let below = self.chunks[start_chunk].prev;
            self.chunks[end_chunk].prev = below;
            self.chunks[start_chunk].release();
        } else {
            self.chunks[end_chunk].prev = Some(start_chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::BufferConfig;
    use super::*;

    /// 50000 elements in 25 chunks of 2000, values derived from the index.
    fn fixture() -> (ChunkedBuffer<u64>, Vec<u64>) {
        fixture_with(false)
    }

    fn fixture_with(skip_index: bool) -> (ChunkedBuffer<u64>, Vec<u64>) {
        let source: Vec<u64> = (0..50_000u64).map(|i| (i * 7) % 120_000).collect();
        let config = BufferConfig::default().capacity(2000).skip_index(skip_index);
        let mut buffer = ChunkedBuffer::with_config(config).expect("config is valid");
        for block in source.chunks(2000) {
            buffer.extend_from_slice(block).expect("append failed");
        }
        (buffer, source)
    }

    /// Walks the live chain and checks every skip entry still describes an
    /// exact power-of-two stride back through the promotion indices.
    fn assert_skip_strides<T: Copy + Default>(buffer: &ChunkedBuffer<T>) {
        let mut current = Some(buffer.head);
        while let Some(id) = current {
            let chunk = &buffer.chunks[id];
            if let Some(table) = &chunk.skip {
                for entry in table.iter() {
                    let stride = 1u32 << entry.exponent;
                    assert_eq!(
                        chunk.index % stride,
                        0,
                        "exponent {} on chunk {} does not divide its index",
                        entry.exponent,
                        chunk.index
                    );
                    assert_eq!(
                        chunk.index - buffer.chunks[entry.chunk].index,
                        stride,
                        "exponent {} on chunk {} lands on chunk {}",
                        entry.exponent,
                        chunk.index,
                        buffer.chunks[entry.chunk].index
                    );
                }
            }
            current = chunk.prev;
        }
    }

    fn model_replace(data: &[u64], old: &[u64], new: &[u64]) -> Vec<u64> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            if i + old.len() <= data.len() && &data[i..i + old.len()] == old {
                out.extend_from_slice(new);
                i += old.len();
            } else {
                out.push(data[i]);
                i += 1;
            }
        }
        out
    }

    #[test]
    fn test_insert_at_fixed_position_repeatedly() {
        let (mut buffer, source) = fixture();
        let digits: Vec<u64> = (0..10).collect();
        for _ in 0..8 {
            buffer.insert_slice(10, &digits).expect("insert failed");
        }
        assert_eq!(buffer.len(), 50_080);
        for i in 0..10 {
            assert_eq!(buffer.get(i).unwrap(), source[i], "prefix at {i}");
        }
        for i in 10..90 {
            assert_eq!(buffer.get(i).unwrap(), (i % 10) as u64, "inserted block at {i}");
        }
        for i in 90..50_080 {
            assert_eq!(buffer.get(i).unwrap(), source[i - 80], "suffix at {i}");
        }
    }

    #[test]
    fn test_remove_contiguous_spans_repeatedly() {
        let (mut buffer, source) = fixture();
        for _ in 0..8 {
            buffer.remove_range(10, 2000).expect("remove failed");
        }
        assert_eq!(buffer.len(), 34_000);
        for i in 0..10 {
            assert_eq!(buffer.get(i).unwrap(), source[i]);
        }
        for i in 10..34_000 {
            assert_eq!(buffer.get(i).unwrap(), source[i + 16_000], "shifted element at {i}");
        }
    }

    #[test]
    fn test_scalar_replace_window() {
        let (mut buffer, source) = fixture();
        for value in 100_000..=100_100u64 {
            buffer.replace_value(value, 0).expect("replace failed");
        }
        for (i, original) in source.iter().enumerate() {
            let expected = if (100_000..=100_100).contains(original) { 0 } else { *original };
            assert_eq!(buffer.get(i).unwrap(), expected, "element {i}");
        }
        assert_eq!(buffer.len(), 50_000);
    }

    #[test]
    fn test_insert_with_skip_index_keeps_strides_exact() {
        let (mut buffer, source) = fixture_with(true);
        let digits: Vec<u64> = (0..10).collect();
        for _ in 0..8 {
            buffer.insert_slice(10, &digits).expect("insert failed");
            assert_skip_strides(&buffer);
        }
        assert_eq!(buffer.len(), 50_080);
        for i in 0..10 {
            assert_eq!(buffer.get(i).unwrap(), source[i]);
        }
        for i in 10..90 {
            assert_eq!(buffer.get(i).unwrap(), (i % 10) as u64);
        }
        for i in (90..50_080).step_by(101) {
            assert_eq!(buffer.get(i).unwrap(), source[i - 80]);
        }
        // An insert at the very end splits the head itself.
        let len = buffer.len();
        buffer.insert_slice(len, &digits).expect("insert failed");
        assert_skip_strides(&buffer);
        assert_eq!(buffer.get(len).unwrap(), 0);
        assert_eq!(buffer.len(), len + 10);
    }

    #[test]
    fn test_remove_with_skip_index_keeps_strides_exact() {
        let (mut buffer, source) = fixture_with(true);
        for _ in 0..8 {
            buffer.remove_range(10, 2000).expect("remove failed");
            assert_skip_strides(&buffer);
        }
        assert_eq!(buffer.len(), 34_000);
        for i in 0..10 {
            assert_eq!(buffer.get(i).unwrap(), source[i]);
        }
        for i in (10..34_000).step_by(97) {
            assert_eq!(buffer.get(i).unwrap(), source[i + 16_000]);
        }
        // A wide removal splices whole chunks out of the chain.
        buffer.remove_range(100, 10_000).expect("remove failed");
        assert_skip_strides(&buffer);
        assert_eq!(buffer.len(), 24_000);
        assert_eq!(buffer.get(100).unwrap(), source[100 + 26_000]);
    }

    #[test]
    fn test_replace_with_skip_index_keeps_strides_exact() {
        let source: Vec<u64> = (0..50_000).map(|i| (i % 9) as u64).collect();
        let config = BufferConfig::default().capacity(2000).skip_index(true);
        let mut buffer = ChunkedBuffer::with_config(config).unwrap();
        for block in source.chunks(2000) {
            buffer.extend_from_slice(block).unwrap();
        }
        let old = vec![3u64, 4, 5];
        let new = vec![42u64, 42, 42, 42];
        let replaced = buffer.replace(&old, &new).unwrap();
        assert_skip_strides(&buffer);
        let expected = model_replace(&source, &old, &new);
        assert_eq!(buffer.len(), expected.len());
        assert_eq!(buffer.to_vec(), expected);
        // Shrinking back exercises the remove path under the same config.
        let shrunk = buffer.replace(&[42, 42, 42, 42], &[1]).unwrap();
        assert_eq!(shrunk, replaced);
        assert_skip_strides(&buffer);
        assert_eq!(buffer.to_vec(), model_replace(&expected, &[42, 42, 42, 42], &[1]));
    }

    #[test]
    fn test_scalar_replace_respects_window_bounds() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        buffer.extend_from_slice(&[5u64, 5, 5, 5, 5, 5]).unwrap();
        buffer.replace_value_in(5, 9, 2, 3).unwrap();
        assert_eq!(buffer.to_vec(), vec![5, 5, 9, 9, 9, 5]);
        assert!(buffer.replace_value_in(5, 9, 4, 3).is_err());
    }

    #[test]
    fn test_insert_remove_inversion() {
        let (mut buffer, _) = fixture();
        let before = buffer.to_vec();
        let wedge: Vec<u64> = (900..930).collect();
        buffer.insert_slice(12_345, &wedge).unwrap();
        assert_eq!(buffer.len(), 50_030);
        assert_eq!(buffer.get(12_345).unwrap(), 900);
        buffer.remove_range(12_345, wedge.len()).unwrap();
        assert_eq!(buffer.to_vec(), before);
    }

    #[test]
    fn test_insert_in_place_within_small_head() {
        let mut buffer = ChunkedBuffer::new();
        buffer.extend_from_slice(&[1u64, 2, 3, 4, 5]).unwrap();
        buffer.insert_slice(2, &[10, 11]).unwrap();
        assert_eq!(buffer.to_vec(), vec![1, 2, 10, 11, 3, 4, 5]);
        // Small gap in a small head shifts in place: still one chunk.
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_insert_at_ends() {
        let mut buffer = ChunkedBuffer::new();
        buffer.extend_from_slice(&[4u64, 5, 6]).unwrap();
        buffer.insert_slice(0, &[1, 2, 3]).unwrap();
        buffer.insert_slice(6, &[7, 8]).unwrap();
        assert_eq!(buffer.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_insert_repeat_is_a_repeat_factor() {
        let mut buffer = ChunkedBuffer::new();
        buffer.extend_from_slice(&[0u64, 9]).unwrap();
        buffer.insert_repeat(1, &[7, 8], 3).unwrap();
        assert_eq!(buffer.to_vec(), vec![0, 7, 8, 7, 8, 7, 8, 9]);
    }

    #[test]
    fn test_insert_validation() {
        let mut buffer = ChunkedBuffer::new();
        buffer.push_repeat(1u64, 4).unwrap();
        assert!(matches!(buffer.insert_slice(5, &[2]), Err(Error::OutOfRange(_))));
        let config = BufferConfig::default().capacity(4).max_capacity(8);
        let mut small = ChunkedBuffer::with_config(config).unwrap();
        small.push_repeat(0u64, 6).unwrap();
        assert!(matches!(
            small.insert_repeat(3, &[1, 2], 2),
            Err(Error::CapacityExceeded { .. })
        ));
        // A zero-count insert is a no-op, not an error.
        small.insert_repeat(3, &[1, 2], 0).unwrap();
        assert_eq!(small.len(), 6);
    }

    #[test]
    fn test_remove_whole_sequence_resets() {
        let mut buffer = ChunkedBuffer::with_capacity(8).unwrap();
        buffer.push_repeat(3u64, 100).unwrap();
        buffer.remove_range(0, 100).unwrap();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        // Still a working append target.
        buffer.push(1).unwrap();
        assert_eq!(buffer.to_vec(), vec![1]);
    }

    #[test]
    fn test_remove_spanning_whole_chunks() {
        let mut buffer = ChunkedBuffer::with_capacity(10).unwrap();
        let source: Vec<u64> = (0..100).collect();
        for block in source.chunks(10) {
            buffer.extend_from_slice(block).unwrap();
        }
        // Drop [15, 85): chunks in the middle are spliced out entirely.
        buffer.remove_range(15, 70).unwrap();
        let mut expected: Vec<u64> = source[..15].to_vec();
        expected.extend_from_slice(&source[85..]);
        assert_eq!(buffer.to_vec(), expected);
        assert_eq!(buffer.len(), 30);
    }

    #[test]
    fn test_remove_aligned_to_chunk_boundaries() {
        let mut buffer = ChunkedBuffer::with_capacity(10).unwrap();
        let source: Vec<u64> = (0..50).collect();
        for block in source.chunks(10) {
            buffer.extend_from_slice(block).unwrap();
        }
        buffer.remove_range(10, 20).unwrap();
        let mut expected: Vec<u64> = source[..10].to_vec();
        expected.extend_from_slice(&source[30..]);
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn test_remove_validation() {
        let mut buffer = ChunkedBuffer::new();
        buffer.push_repeat(0u64, 10).unwrap();
        assert!(matches!(buffer.remove_range(5, 6), Err(Error::OutOfRange(_))));
        buffer.remove_range(10, 0).unwrap();
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_replace_same_size() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        let source = vec![1u64, 2, 3, 1, 2, 4, 1, 2, 3, 3, 1, 2];
        buffer.extend_from_slice(&source).unwrap();
        let replaced = buffer.replace(&[1, 2], &[8, 9]).unwrap();
        assert_eq!(replaced, 4);
        assert_eq!(buffer.to_vec(), model_replace(&source, &[1, 2], &[8, 9]));
        assert_eq!(buffer.len(), source.len());
    }

    #[test]
    fn test_replace_growing() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        let source = vec![1u64, 2, 0, 1, 2, 1, 2, 0, 0, 1, 2];
        buffer.extend_from_slice(&source).unwrap();
        let replaced = buffer.replace(&[1, 2], &[7, 7, 7]).unwrap();
        assert_eq!(replaced, 4);
        assert_eq!(buffer.to_vec(), model_replace(&source, &[1, 2], &[7, 7, 7]));
        assert_eq!(buffer.len(), source.len() + replaced);
    }

    #[test]
    fn test_replace_shrinking() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        let source = vec![1u64, 2, 3, 9, 1, 2, 3, 1, 2, 3, 9, 9, 1, 2, 3];
        buffer.extend_from_slice(&source).unwrap();
        let replaced = buffer.replace(&[1, 2, 3], &[5]).unwrap();
        assert_eq!(replaced, 4);
        assert_eq!(buffer.to_vec(), model_replace(&source, &[1, 2, 3], &[5]));
        assert_eq!(buffer.len(), source.len() - 2 * replaced);
    }

    #[test]
    fn test_replace_with_empty_deletes_occurrences() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        let source = vec![6u64, 6, 1, 6, 6, 2, 6, 6];
        buffer.extend_from_slice(&source).unwrap();
        let replaced = buffer.replace(&[6, 6], &[]).unwrap();
        assert_eq!(replaced, 3);
        assert_eq!(buffer.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_replace_pattern_spanning_chunk_boundaries() {
        // Chunk capacity 3 guarantees the pattern straddles boundaries.
        let mut buffer = ChunkedBuffer::with_capacity(3).unwrap();
        let mut source = Vec::new();
        for _ in 0..40 {
            source.extend_from_slice(&[1u64, 2, 3, 4, 5]);
        }
        for block in source.chunks(3) {
            buffer.extend_from_slice(block).unwrap();
        }
        let replaced = buffer.replace(&[3, 4, 5, 1], &[0, 0]).unwrap();
        assert_eq!(buffer.to_vec(), model_replace(&source, &[3, 4, 5, 1], &[0, 0]));
        assert_eq!(replaced, 39);
    }

    #[test]
    fn test_replace_large_fixture_against_model() {
        // A repeating cycle yields thousands of matches spread over dozens
        // of chunks, so the per-chunk batches and the trailing batches of a
        // growing replace all get exercised.
        let source: Vec<u64> = (0..50_000).map(|i| (i % 9) as u64).collect();
        let mut buffer = ChunkedBuffer::with_capacity(2000).unwrap();
        for block in source.chunks(2000) {
            buffer.extend_from_slice(block).unwrap();
        }
        let old = vec![3u64, 4, 5];
        let new = vec![42u64, 42, 42, 42];
        let replaced = buffer.replace(&old, &new).unwrap();
        let expected = model_replace(&source, &old, &new);
        assert!(replaced > 5000, "expected thousands of matches, got {replaced}");
        assert_eq!(buffer.len(), expected.len());
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn test_replace_window_only() {
        let mut buffer = ChunkedBuffer::with_capacity(4).unwrap();
        let source = vec![1u64, 1, 1, 1, 1, 1];
        buffer.extend_from_slice(&source).unwrap();
        let replaced = buffer.replace_in(&[1], &[2], 2, 3).unwrap();
        assert_eq!(replaced, 3);
        assert_eq!(buffer.to_vec(), vec![1, 1, 2, 2, 2, 1]);
    }

    #[test]
    fn test_replace_validation() {
        let mut buffer = ChunkedBuffer::new();
        buffer.push_repeat(1u64, 4).unwrap();
        assert!(matches!(buffer.replace(&[], &[1]), Err(Error::InvalidInput(_))));
        assert!(matches!(buffer.replace_in(&[1], &[2], 2, 3), Err(Error::OutOfRange(_))));
        let config = BufferConfig::default().capacity(4).max_capacity(6);
        let mut small = ChunkedBuffer::with_config(config).unwrap();
        small.extend_from_slice(&[1u64, 1, 1, 1]).unwrap();
        assert!(matches!(
            small.replace(&[1], &[2, 2]),
            Err(Error::CapacityExceeded { .. })
        ));
    }
}
