use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::frame::decode_frame;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete payloads.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload_size: usize,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T, max_payload_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
        }
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Returns `Ok(None)` when the stream ends on a frame boundary and
    /// `Err(CodecError::ConnectionClosed)` when it ends mid-frame.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf, self.max_payload_size)? {
                return Ok(Some(payload));
            }
            if !self.fill()? {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(CodecError::ConnectionClosed);
            }
        }
    }

    /// Whether the stream ended with no buffered bytes left.
    pub fn at_end(&mut self) -> Result<bool> {
        if !self.buf.is_empty() {
            return Ok(false);
        }
        Ok(!self.fill()?)
    }

    /// Read one chunk into the buffer. Returns `false` at end of stream.
    fn fill(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}
