//! Byte stream facade over a chunked buffer.
//!
//! [`ChunkedByteStream`] exposes a `ChunkedBuffer<u8>` through the familiar
//! random-access stream contract: a read/write position, seek, length and
//! truncation, plus [`std::io`] and [`tokio::io`] trait impls. The tokio
//! impls are synchronous under the hood: every poll runs the blocking body
//! and returns `Poll::Ready`, so the stream satisfies async interfaces
//! without suspension points, locks or buffered state.
//!
//! Positions and lengths are capped at `i32::MAX` so streams interoperate
//! with consumers that index with signed 32-bit offsets.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};
use tracing::trace;

use crate::buffer::ChunkedBuffer;
use crate::errinput;
use crate::error::{Error, Result};

/// Maximum stream position and length.
pub const MAX_STREAM_LEN: usize = i32::MAX as usize;

/// A random-access, resizable byte stream backed by a chunked buffer.
#[derive(Debug)]
pub struct ChunkedByteStream {
    buffer: ChunkedBuffer<u8>,
    position: usize,
    open: bool,
    writable: bool,
}

impl ChunkedByteStream {
    /// Creates an empty writable stream.
    pub fn new() -> Self {
        Self::from_buffer(ChunkedBuffer::new()).expect("empty buffer is within stream bounds")
    }

    /// Creates an empty writable stream with an initial capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::from_buffer(ChunkedBuffer::with_capacity(capacity)?)
    }

    /// Wraps an existing byte buffer as a writable stream positioned at 0.
    pub fn from_buffer(buffer: ChunkedBuffer<u8>) -> Result<Self> {
        if buffer.len() > MAX_STREAM_LEN {
            return errinput!(
                "buffer length {} exceeds the stream maximum {}",
                buffer.len(),
                MAX_STREAM_LEN
            );
        }
        Ok(Self { buffer, position: 0, open: true, writable: true })
    }

    /// Wraps an existing byte buffer as a read-only stream.
    pub fn read_only(buffer: ChunkedBuffer<u8>) -> Result<Self> {
        let mut stream = Self::from_buffer(buffer)?;
        stream.writable = false;
        Ok(stream)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_readable(&self) -> bool {
        self.open
    }

    pub fn is_seekable(&self) -> bool {
        self.open
    }

    pub fn is_writable(&self) -> bool {
        self.open && self.writable
    }

    /// Length of the stream contents. Fails once the stream is closed.
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.buffer.len())
    }

    /// Current read/write position. Fails once the stream is closed.
    pub fn position(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.position)
    }

    /// Capacity of the backing buffer. Fails once the stream is closed.
    pub fn capacity(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.buffer.capacity())
    }

    /// Moves the position. Any value up to the stream maximum is legal,
    /// including positions past the current end.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        self.ensure_open()?;
        if position > MAX_STREAM_LEN {
            return errinput!("position {} exceeds the stream maximum {}", position, MAX_STREAM_LEN);
        }
        self.position = position;
        Ok(())
    }

    /// Truncates or zero-extends the stream to `length`. The position is
    /// left where it was and may exceed the new length.
    pub fn set_len(&mut self, length: usize) -> Result<()> {
        self.ensure_writable()?;
        if length > MAX_STREAM_LEN {
            return Err(Error::CapacityExceeded { requested: length, max: MAX_STREAM_LEN });
        }
        self.buffer.resize(length)
    }

    /// Reads up to `dst.len()` bytes at the position, advancing by the
    /// count returned. Reads at or past the end return 0.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let len = self.buffer.len();
        let count = dst.len().min(len.saturating_sub(self.position));
        if count > 0 {
            self.buffer.copy_to(self.position, dst, 0, count)?;
            self.position += count;
        }
        Ok(count)
    }

    /// Reads one byte, or None at the end of the stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(if self.read(&mut byte)? == 1 { Some(byte[0]) } else { None })
    }

    /// Writes `src` at the position: live bytes are overwritten in place,
    /// the remainder is appended. A position past the end zero-pads the gap
    /// first. Advances the position past the written bytes.
    pub fn write(&mut self, src: &[u8]) -> Result<usize> {
        self.ensure_writable()?;
        if src.is_empty() {
            return Ok(0);
        }
        let end = self.position.checked_add(src.len()).unwrap_or(usize::MAX);
        if end > MAX_STREAM_LEN {
            return Err(Error::CapacityExceeded { requested: end, max: MAX_STREAM_LEN });
        }
        if self.position > self.buffer.len() {
            let pad = self.position - self.buffer.len();
            self.buffer.push_repeat(0, pad)?;
        }
        let overlap = src.len().min(self.buffer.len() - self.position);
        if overlap > 0 {
            self.buffer.write_at(self.position, &src[..overlap])?;
        }
        if overlap < src.len() {
            self.buffer.extend_from_slice(&src[overlap..])?;
        }
        self.position = end;
        Ok(src.len())
    }

    /// Writes one byte at the position.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte]).map(|_| ())
    }

    /// Repositions the stream. Landing before the start is an IO failure;
    /// overshooting the end is allowed up to the stream maximum.
    pub fn seek(&mut self, from: SeekFrom) -> Result<usize> {
        self.ensure_open()?;
        let target = match from {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => self.position as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.buffer.len() as i128 + i128::from(delta),
        };
        if target < 0 {
            return Err(Error::IO(format!("seek to {target} before the start of the stream")));
        }
        if target > MAX_STREAM_LEN as i128 {
            return errinput!("seek to {} exceeds the stream maximum {}", target, MAX_STREAM_LEN);
        }
        self.position = target as usize;
        Ok(self.position)
    }

    /// No-op: the stream holds no buffered state.
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Contiguous snapshot of the contents. Unlike the positional
    /// operations this keeps working after close, since the buffer is
    /// retained.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Streams the entire contents into `writer`, chunk slice by chunk
    /// slice, with no intermediate allocation. The position is unaffected.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.ensure_open()?;
        for slice in self.buffer.slices() {
            writer.write_all(slice)?;
        }
        Ok(())
    }

    /// Drains the bytes remaining at the position into `writer`, advancing
    /// the position to the end. Returns the number of bytes copied.
    pub fn copy_to_writer<W: Write>(&mut self, writer: &mut W) -> Result<usize> {
        self.ensure_open()?;
        let len = self.buffer.len();
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position;
        let mut consumed = 0;
        for slice in self.buffer.slices() {
            let slice_start = consumed;
            consumed += slice.len();
            if consumed <= start {
                continue;
            }
            let from = start.saturating_sub(slice_start);
            writer.write_all(&slice[from..])?;
        }
        self.position = len;
        Ok(len - start)
    }

    /// The optimized same-type copy: drains the bytes remaining at the
    /// position straight into another chunked stream's write path, slice by
    /// slice, with no intermediate buffer.
    pub fn copy_to(&mut self, dst: &mut ChunkedByteStream) -> Result<usize> {
        self.ensure_open()?;
        dst.ensure_writable()?;
        let len = self.buffer.len();
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position;
        let mut consumed = 0;
        for slice in self.buffer.slices() {
            let slice_start = consumed;
            consumed += slice.len();
            if consumed <= start {
                continue;
            }
            let from = start.saturating_sub(slice_start);
            dst.write(&slice[from..])?;
        }
        self.position = len;
        Ok(len - start)
    }

    /// Closes the stream. Positional operations fail afterwards; the
    /// contents remain snapshotable. Idempotent, releases no resources.
    pub fn close(&mut self) {
        self.open = false;
        self.writable = false;
        trace!("closed chunked byte stream");
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }
}

impl Default for ChunkedByteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for ChunkedByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ChunkedByteStream::read(self, buf).map_err(io::Error::from)
    }
}

impl Write for ChunkedByteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ChunkedByteStream::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for ChunkedByteStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ChunkedByteStream::seek(self, pos)
            .map(|position| position as u64)
            .map_err(io::Error::from)
    }
}

impl AsyncRead for ChunkedByteStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let stream = self.get_mut();
        let count = match ChunkedByteStream::read(stream, buf.initialize_unfilled()) {
            Ok(count) => count,
            Err(err) => return Poll::Ready(Err(err.into())),
        };
        buf.advance(count);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ChunkedByteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(ChunkedByteStream::write(self.get_mut(), buf).map_err(io::Error::from))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().close();
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for ChunkedByteStream {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        ChunkedByteStream::seek(self.get_mut(), position)
            .map(|_| ())
            .map_err(io::Error::from)
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.position as u64))
    }
}
