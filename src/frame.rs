//! # Wire Framing & Buffer Pool
//!
//! Purpose: Encode and decode the length-prefixed, message-coded frames
//! used by every request/response exchange, and reuse byte buffers across
//! calls to keep the hot path allocation-free.
//!
//! ## Wire Format
//!
//! ```text
//! +-------------------+--------+------------------------+
//! | length: u32 (BE)  | code:u8| payload: length-1 bytes |
//! +-------------------+--------+------------------------+
//! ```
//!
//! `length` covers the code byte plus the payload. A frame shorter than 5
//! bytes (not enough to hold `length` and `code`) is malformed.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: the same `Vec<u8>` carries the outbound payload
//!    (written starting at offset 5, leaving room for the header) and is
//!    then reused to hold the inbound response.
//! 2. **Chunked Reads**: a first read attempts to fill the buffer in one
//!    syscall; a fixed scratch buffer absorbs any remainder.
//! 3. **Pool, Don't Allocate**: buffers return to a process-wide pool reset
//!    to zero length but with their capacity intact.

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{RiakError, RiakResult};

/// Bytes read per extra chunked-read call once the initial read undershoots.
const SCRATCH_SIZE: usize = 4096;

/// Header size: 4-byte length prefix + 1-byte message code.
pub const HEADER_LEN: usize = 5;

/// Reserves `HEADER_LEN` bytes at the front of `buf` for the frame header.
///
/// Callers append their serialized payload after this call and then invoke
/// [`finish_frame`] once the payload is complete.
pub fn reserve_header(buf: &mut Vec<u8>) {
    buf.clear();
    buf.resize(HEADER_LEN, 0);
}

/// Writes the big-endian length prefix and message code into the header
/// reserved by [`reserve_header`], using the buffer's current length to
/// compute the payload size.
pub fn finish_frame(buf: &mut [u8], code: u8) {
    debug_assert!(buf.len() >= HEADER_LEN);
    let payload_len = (buf.len() - HEADER_LEN) as u32;
    let length = payload_len + 1;
    buf[0..4].copy_from_slice(&length.to_be_bytes());
    buf[4] = code;
}

/// Writes a frame (`buf` already holds the reserved header plus payload) to
/// the stream.
pub async fn write_frame<W>(stream: &mut W, buf: &[u8]) -> RiakResult<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    stream.write_all(buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one frame from the stream into `buf`, leaving `buf` holding only
/// the payload (the header is consumed, not stored). Returns the message
/// code.
pub async fn read_frame<R>(stream: &mut R, buf: &mut Vec<u8>) -> RiakResult<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if length == 0 {
        return Err(RiakError::Protocol);
    }
    let code = header[4];
    let payload_len = length - 1;

    buf.clear();
    buf.resize(payload_len, 0);
    if payload_len == 0 {
        return Ok(code);
    }

    // Initial chunked read fills as much of the buffer as one syscall gives us.
    let mut filled = stream.read(&mut buf[..]).await?;
    if filled == 0 {
        return Err(RiakError::Io(eof()));
    }

    // Any remainder trickles in through a fixed scratch buffer.
    let mut scratch = [0u8; SCRATCH_SIZE];
    while filled < payload_len {
        let want = (payload_len - filled).min(SCRATCH_SIZE);
        let n = stream.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(RiakError::Io(eof()));
        }
        buf[filled..filled + n].copy_from_slice(&scratch[..n]);
        filled += n;
    }

    Ok(code)
}

fn eof() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed mid-frame")
}

/// Process-wide pool of reusable byte buffers.
///
/// Buffers are freely shared and thread-safe; a short-lived
/// [`parking_lot::Mutex`] guards the free list, matching the brief critical
/// sections the teacher's in-memory engine uses `parking_lot` for elsewhere
/// in this workspace.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

/// Buffers beyond this count are dropped instead of pooled, to bound memory
/// held by a burst of large payloads.
const MAX_POOLED: usize = 64;

/// Default capacity for a freshly allocated buffer.
const DEFAULT_CAPACITY: usize = 256;

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Acquires a buffer, reusing a pooled one when available.
    pub fn acquire(&self) -> Vec<u8> {
        if let Some(buf) = self.free.lock().pop() {
            return buf;
        }
        Vec::with_capacity(DEFAULT_CAPACITY)
    }

    /// Returns a buffer to the pool, truncated to zero length but keeping
    /// its capacity.
    pub fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_frame() {
        let mut out = Vec::new();
        reserve_header(&mut out);
        out.extend_from_slice(b"hello");
        finish_frame(&mut out, 9);

        let mut cursor = Cursor::new(out);
        let mut buf = Vec::new();
        let code = read_frame(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(code, 9);
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn round_trips_empty_payload() {
        let mut out = Vec::new();
        reserve_header(&mut out);
        finish_frame(&mut out, 2);

        let mut cursor = Cursor::new(out);
        let mut buf = Vec::new();
        let code = read_frame(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(code, 2);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn rejects_zero_length() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 0, 9]);
        let mut buf = Vec::new();
        let err = read_frame(&mut cursor, &mut buf).await.unwrap_err();
        assert!(matches!(err, RiakError::Protocol));
    }

    #[test]
    fn buffer_pool_reuses_capacity() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"some payload bytes");
        let cap = buf.capacity();
        pool.release(buf);

        let reused = pool.acquire();
        assert_eq!(reused.len(), 0);
        assert!(reused.capacity() >= cap);
    }
}
