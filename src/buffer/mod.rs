//! Chunked mutable value sequences.
//!
//! [`ChunkedBuffer`] stores a sequence of fixed-size values as a reverse
//! linked chain of array chunks instead of one contiguous allocation. The
//! head chunk is the logical *tail* of the sequence and the only chunk with
//! spare capacity: appends write straight into it with no pointer chasing,
//! and when it fills, its storage is frozen into a previous-chunk and the
//! head starts over on a fresh array. Buffers in the hundreds of millions
//! of elements therefore never require a single large allocation.
//!
//! Random access walks the chain backward from the head. Buffers that opt
//! in via [`BufferConfig::skip_index`] additionally maintain sparse
//! back-pointer tables over the chain (see `skip`), which turn the walk
//! into a coarse-to-fine descent once the chain is long enough to matter.

mod chunk;
mod edit;
mod skip;

use std::ops::{Index, IndexMut};

use tracing::trace;

use crate::error::{Error, Result};
use crate::{errinput, errrange};

use chunk::{new_backing, Chunk, ChunkId};

/// Initial head capacity in elements.
pub const DEFAULT_CAPACITY: usize = 16;

/// Cap on the backing array length of promoted chunks.
pub const MAX_CHUNK_LEN: usize = 2000;

/// Default ceiling on total capacity: the maximum signed 32-bit index.
pub const DEFAULT_MAX_CAPACITY: usize = i32::MAX as usize;

/// Configuration for a chunked buffer.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Initial head capacity in elements (default: 16).
    pub capacity: usize,

    /// Ceiling on the total capacity (default: `i32::MAX`).
    pub max_capacity: usize,

    /// Maintain per-chunk skip tables for logarithmic chunk lookup on long
    /// chains (default: false).
    pub skip_index: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
            skip_index: false,
        }
    }
}

impl BufferConfig {
    /// Set the initial head capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the total capacity ceiling.
    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Enable or disable the skip index.
    pub fn skip_index(mut self, enabled: bool) -> Self {
        self.skip_index = enabled;
        self
    }
}

/// An append-optimized, index-accessible mutable sequence of fixed-size
/// values, stored as a reverse-linked chain of chunks.
#[derive(Debug)]
pub struct ChunkedBuffer<T> {
    /// Chunk arena. Slots are never reused; a spliced-out chunk keeps its
    /// metadata slot (with released storage) so stale skip pointers stay
    /// resolvable.
    chunks: Vec<Chunk<T>>,
    /// The tail of the logical sequence and the only chunk with slack.
    head: ChunkId,
    max_capacity: usize,
    skip_index: bool,
}

impl<T: Copy + Default> ChunkedBuffer<T> {
    /// Creates an empty buffer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default()).expect("default config is valid")
    }

    /// Creates an empty buffer with the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(BufferConfig::default().capacity(capacity))
    }

    /// Creates an empty buffer from a full configuration.
    pub fn with_config(config: BufferConfig) -> Result<Self> {
        if config.capacity > config.max_capacity {
            return errinput!(
                "initial capacity {} exceeds maximum capacity {}",
                config.capacity,
                config.max_capacity
            );
        }
        Ok(Self {
            chunks: vec![Chunk::new(config.capacity, 0, 0, None)],
            head: 0,
            max_capacity: config.max_capacity,
            skip_index: config.skip_index,
        })
    }

    /// Creates a buffer holding a copy of `values` in a single head chunk
    /// of the given capacity.
    pub fn from_slice(values: &[T], capacity: usize) -> Result<Self> {
        if values.len() > capacity {
            return errinput!("{} values exceed the requested capacity {}", values.len(), capacity);
        }
        let mut buffer = Self::with_capacity(capacity)?;
        let head = &mut buffer.chunks[buffer.head];
        head.data[..values.len()].copy_from_slice(values);
        head.len = values.len();
        Ok(buffer)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.chunks[self.head].end()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total capacity: the head's offset plus its backing array length.
    pub fn capacity(&self) -> usize {
        let head = &self.chunks[self.head];
        head.offset + head.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Reallocates the head's backing array so the total capacity becomes
    /// `capacity`. Fails below the current length or above the maximum.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.len() {
            return errinput!("capacity {} is below the current length {}", capacity, self.len());
        }
        if capacity > self.max_capacity {
            return Err(Error::CapacityExceeded { requested: capacity, max: self.max_capacity });
        }
        let head = &mut self.chunks[self.head];
        let mut data = new_backing(capacity - head.offset);
        data[..head.len].copy_from_slice(head.live());
        head.data = data;
        Ok(())
    }

    /// Grows or shrinks the sequence to `new_len`. Growth appends default
    /// values; shrinking trims the chunk containing the new end and, when
    /// that chunk is not the head, repoints the head at it behind a backing
    /// array enlarged to preserve the total capacity.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        let len = self.len();
        if new_len > len {
            return self.push_repeat(T::default(), new_len - len);
        }
        if new_len == len {
            return Ok(());
        }
        let target = self.find_chunk(new_len);
        if target == self.head {
            let head = &mut self.chunks[self.head];
            head.len = new_len - head.offset;
            return Ok(());
        }
        let total_capacity = self.capacity();
        let mut current = self.head;
        while current != target {
            let prev = self.chunks[current].prev.expect("shrink target is below the head");
            self.chunks[current].release();
            current = prev;
        }
        let chunk = &mut self.chunks[target];
        let keep = new_len - chunk.offset;
        let mut data = new_backing(total_capacity - chunk.offset);
        data[..keep].copy_from_slice(&chunk.data[..keep]);
        chunk.data = data;
        chunk.len = keep;
        self.head = target;
        Ok(())
    }

    /// Appends one value.
    pub fn push(&mut self, value: T) -> Result<()> {
        self.push_repeat(value, 1)
    }

    /// Appends `count` copies of `value`, promoting the head as it fills.
    pub fn push_repeat(&mut self, value: T, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.check_capacity(count)?;
        let mut remaining = count;
        while remaining > 0 {
            if self.chunks[self.head].is_full() {
                self.expand_by_a_block(remaining)?;
            }
            let head = &mut self.chunks[self.head];
            let take = remaining.min(head.capacity() - head.len);
            head.data[head.len..head.len + take].fill(value);
            head.len += take;
            remaining -= take;
        }
        Ok(())
    }

    /// Appends a slice. One- and two-element appends that fit in the head
    /// are inlined; anything else takes the bulk path.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        let head = &mut self.chunks[self.head];
        match values.len() {
            0 => return Ok(()),
            1 if head.len < head.capacity() => {
                head.data[head.len] = values[0];
                head.len += 1;
                return Ok(());
            }
            2 if head.len + 2 <= head.capacity() => {
                head.data[head.len] = values[0];
                head.data[head.len + 1] = values[1];
                head.len += 2;
                return Ok(());
            }
            _ => {}
        }
        self.append_slice(values)
    }

    /// Bulk append: tops up the head, then lands the whole remainder in one
    /// fresh chunk sized `max(remaining, min(len, MAX_CHUNK_LEN))`.
    fn append_slice(&mut self, values: &[T]) -> Result<()> {
        self.check_capacity(values.len())?;
        let head = &mut self.chunks[self.head];
        let take = values.len().min(head.capacity() - head.len);
        head.data[head.len..head.len + take].copy_from_slice(&values[..take]);
        head.len += take;
        let rest = &values[take..];
        if rest.is_empty() {
            return Ok(());
        }
        let available = self.max_capacity - self.len();
        let size = rest.len().max(self.len().min(MAX_CHUNK_LEN)).min(available);
        self.promote_head(size)?;
        let head = &mut self.chunks[self.head];
        head.data[..rest.len()].copy_from_slice(rest);
        head.len = rest.len();
        Ok(())
    }

    /// Reads the element at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        let (id, at) = self.locate(index)?;
        Ok(self.chunks[id].data[at])
    }

    /// Overwrites the element at `index`.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let (id, at) = self.locate(index)?;
        self.chunks[id].data[at] = value;
        Ok(())
    }

    /// Overwrites a live range in place.
    pub fn write_at(&mut self, index: usize, values: &[T]) -> Result<()> {
        let end = index.checked_add(values.len()).unwrap_or(usize::MAX);
        if end > self.len() {
            return errrange!("range {}..{} beyond length {}", index, end, self.len());
        }
        let mut pos = index;
        let mut copied = 0;
        while copied < values.len() {
            let id = self.find_chunk(pos);
            let chunk = &mut self.chunks[id];
            let at = pos - chunk.offset;
            let take = (chunk.len - at).min(values.len() - copied);
            assert!(take > 0, "empty chunk inside a live range; buffer is corrupted");
            chunk.data[at..at + take].copy_from_slice(&values[copied..copied + take]);
            copied += take;
            pos += take;
        }
        Ok(())
    }

    /// Copies `count` elements starting at `src_index` into
    /// `dst[dst_index..]`, walking the intersecting chunks backward.
    pub fn copy_to(&self, src_index: usize, dst: &mut [T], dst_index: usize, count: usize) -> Result<()> {
        let src_end = src_index.checked_add(count).unwrap_or(usize::MAX);
        if src_end > self.len() {
            return errrange!("source range {}..{} beyond length {}", src_index, src_end, self.len());
        }
        let dst_end = dst_index.checked_add(count).unwrap_or(usize::MAX);
        if dst_end > dst.len() {
            return errinput!(
                "destination range {}..{} beyond buffer length {}",
                dst_index,
                dst_end,
                dst.len()
            );
        }
        if count == 0 {
            return Ok(());
        }
        let mut current = self.find_chunk(src_end - 1);
        loop {
            let chunk = &self.chunks[current];
            let lo = src_index.max(chunk.offset);
            let hi = src_end.min(chunk.end());
            if lo < hi {
                dst[dst_index + (lo - src_index)..dst_index + (hi - src_index)]
                    .copy_from_slice(&chunk.data[lo - chunk.offset..hi - chunk.offset]);
            }
            if chunk.offset <= src_index {
                return Ok(());
            }
            current = chunk.prev.expect("chunk chain ended inside the source range");
        }
    }

    /// Materializes the whole sequence as one contiguous vector.
    pub fn to_vec(&self) -> Vec<T> {
        let len = self.len();
        let mut out = vec![T::default(); len];
        let mut current = Some(self.head);
        while let Some(id) = current {
            let chunk = &self.chunks[id];
            assert!(chunk.end() <= len, "chunk overruns the sequence; buffer is corrupted");
            out[chunk.offset..chunk.end()].copy_from_slice(chunk.live());
            current = chunk.prev;
        }
        out
    }

    /// Materializes a sub-range as a contiguous vector.
    pub fn to_vec_range(&self, start: usize, length: usize) -> Result<Vec<T>> {
        let mut out = vec![T::default(); length];
        self.copy_to(start, &mut out, 0, length)?;
        Ok(out)
    }

    /// The live chunk slices in logical order, front to back. Lets callers
    /// drain the sequence without materializing it.
    pub fn slices(&self) -> Slices<'_, T> {
        let mut order = Vec::new();
        let mut current = Some(self.head);
        while let Some(id) = current {
            order.push(id);
            current = self.chunks[id].prev;
        }
        Slices { buffer: self, order }
    }

    /// Approximate resident size in bytes: the live chain's backing arrays
    /// plus their skip table entries.
    pub fn mem_size(&self) -> usize {
        let mut total = 0;
        let mut current = Some(self.head);
        while let Some(id) = current {
            let chunk = &self.chunks[id];
            total += chunk.capacity() * std::mem::size_of::<T>();
            if let Some(table) = &chunk.skip {
                total += table.len() * std::mem::size_of::<skip::SkipEntry>();
            }
            current = chunk.prev;
        }
        total
    }

    fn locate(&self, index: usize) -> Result<(ChunkId, usize)> {
        if index >= self.len() {
            return errrange!("index {} beyond length {}", index, self.len());
        }
        let id = self.find_chunk(index);
        let chunk = &self.chunks[id];
        debug_assert!(chunk.offset <= index && index < chunk.end());
        Ok((id, index - chunk.offset))
    }

    fn check_capacity(&self, extra: usize) -> Result<()> {
        let requested = self.len().checked_add(extra).unwrap_or(usize::MAX);
        if requested > self.max_capacity {
            return Err(Error::CapacityExceeded { requested, max: self.max_capacity });
        }
        Ok(())
    }

    /// Promotes the full head and starts a fresh one sized for at least
    /// `min_needed` further elements, doubling up to [`MAX_CHUNK_LEN`].
    fn expand_by_a_block(&mut self, min_needed: usize) -> Result<()> {
        let available = self.max_capacity - self.len();
        let size = min_needed.max(self.len()).min(MAX_CHUNK_LEN).min(available);
        self.promote_head(size)
    }

    /// Freezes the current head's storage into a new previous-chunk and
    /// repoints the head at a fresh backing array of `size` elements. The
    /// frozen chunk adopts the head's data, length, offset, promotion index
    /// and links; the head advances its offset and index.
    fn promote_head(&mut self, size: usize) -> Result<()> {
        let head_id = self.head;
        debug_assert!(self.chunks[head_id].is_full());
        let new_offset = self.chunks[head_id].end();
        let requested = new_offset.checked_add(size).unwrap_or(usize::MAX);
        if requested > self.max_capacity {
            return Err(Error::CapacityExceeded { requested, max: self.max_capacity });
        }
        let frozen = {
            let head = &mut self.chunks[head_id];
            let frozen = Chunk {
                data: std::mem::replace(&mut head.data, new_backing(size)),
                len: head.len,
                offset: head.offset,
                index: head.index,
                prev: head.prev,
                skip: head.skip.take(),
            };
            head.len = 0;
            head.offset = new_offset;
            head.index += 1;
            frozen
        };
        let frozen_id = self.chunks.len();
        self.chunks.push(frozen);
        self.chunks[head_id].prev = Some(frozen_id);
        trace!(
            chunk_index = self.chunks[head_id].index,
            offset = new_offset,
            size,
            "promoted head chunk"
        );
        if self.skip_index && self.chunks[head_id].index % 2 == 0 {
            self.refresh_head_skip();
        }
        Ok(())
    }
}

impl<T: Copy + Default> Default for ChunkedBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> Index<usize> for ChunkedBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        let (id, at) = self.locate(index).expect("index out of range");
        &self.chunks[id].data[at]
    }
}

impl<T: Copy + Default> IndexMut<usize> for ChunkedBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let (id, at) = self.locate(index).expect("index out of range");
        &mut self.chunks[id].data[at]
    }
}

/// Two buffers are equal when their length, capacity and capacity ceiling
/// match and their contents agree. The contents walk aligns both chunk
/// chains backward in parallel, comparing the largest runs the two
/// chunkings share, so differently chunked but content-equal buffers
/// compare equal without materializing either side.
impl<T: Copy + Default + PartialEq> PartialEq for ChunkedBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len()
            || self.capacity() != other.capacity()
            || self.max_capacity != other.max_capacity
        {
            return false;
        }
        let mut a = TailCursor::new(self);
        let mut b = TailCursor::new(other);
        let mut remaining = self.len();
        while remaining > 0 {
            let run = a.available().min(b.available());
            debug_assert!(run > 0, "cursors exhausted before the shared length");
            if a.take(run) != b.take(run) {
                return false;
            }
            remaining -= run;
        }
        true
    }
}

impl<T: Copy + Default + Eq> Eq for ChunkedBuffer<T> {}

/// Backward cursor over one buffer's live elements, used by the parallel
/// equality walk.
struct TailCursor<'a, T> {
    buffer: &'a ChunkedBuffer<T>,
    chunk: ChunkId,
    /// Live elements of the current chunk not yet consumed.
    pos: usize,
}

impl<'a, T: Copy + Default> TailCursor<'a, T> {
    fn new(buffer: &'a ChunkedBuffer<T>) -> Self {
        Self { buffer, chunk: buffer.head, pos: buffer.chunks[buffer.head].len }
    }

    /// Elements consumable from the current chunk, descending past empty
    /// chunks. Returns 0 only when the chain is exhausted.
    fn available(&mut self) -> usize {
        while self.pos == 0 {
            match self.buffer.chunks[self.chunk].prev {
                Some(prev) => {
                    self.chunk = prev;
                    self.pos = self.buffer.chunks[prev].len;
                }
                None => return 0,
            }
        }
        self.pos
    }

    fn take(&mut self, run: usize) -> &'a [T] {
        let buffer = self.buffer;
        let slice = &buffer.chunks[self.chunk].data[self.pos - run..self.pos];
        self.pos -= run;
        slice
    }
}

/// Iterator over a buffer's live chunk slices in logical order.
#[derive(Debug)]
pub struct Slices<'a, T> {
    buffer: &'a ChunkedBuffer<T>,
    /// Chain slot ids collected head-first; yielded back to front.
    order: Vec<ChunkId>,
}

impl<'a, T: Copy + Default> Iterator for Slices<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.order.pop()?;
        let buffer = self.buffer;
        Some(buffer.chunks[id].live())
    }
}
