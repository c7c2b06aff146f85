//! Token encoding for NAR streams.

use std::io::Write;

use super::{encoded_len, padding_len};
use crate::Result;

const ZERO_PADDING: [u8; 8] = [0u8; 8];

/// Writes NAR tokens to a byte stream.
///
/// This is the inverse of [`TokenReader`](super::TokenReader): every string
/// is written as an 8-byte little-endian length, the bytes themselves, and
/// zero padding to the next 8-byte boundary.
#[derive(Debug)]
pub struct TokenWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> TokenWriter<W> {
    /// Creates a new token writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Returns the number of bytes written so far, padding included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes a length-prefixed, zero-padded string token.
    pub fn write_string(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(bytes)?;

        let pad = padding_len(len) as usize;
        if pad > 0 {
            self.inner.write_all(&ZERO_PADDING[..pad])?;
        }
        self.bytes_written += encoded_len(len);
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Consumes the token writer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
