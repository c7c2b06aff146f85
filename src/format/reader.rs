//! Token decoding for NAR streams.

use std::io::{self, Read};

use super::padding_len;
use crate::{Error, Result};

/// Initial buffer reservation for a string token.
///
/// Larger tokens grow the buffer as bytes arrive, so a forged length prefix
/// cannot force a huge allocation before the data is actually there.
const INITIAL_TOKEN_CAPACITY: u64 = 64 * 1024;

/// Reads NAR tokens from a byte stream.
///
/// The reader never seeks; it tracks how many bytes it has consumed so that
/// errors can report the offset at which decoding failed.
///
/// # Example
///
/// ```rust
/// use narpatch::format::TokenReader;
///
/// let data = [
///     5, 0, 0, 0, 0, 0, 0, 0,
///     b'h', b'e', b'l', b'l', b'o', 0, 0, 0,
/// ];
/// let mut reader = TokenReader::new(&data[..]);
/// assert_eq!(reader.read_string()?, b"hello");
/// assert_eq!(reader.position(), 16);
/// # Ok::<(), narpatch::Error>(())
/// ```
#[derive(Debug)]
pub struct TokenReader<R> {
    inner: R,
    position: u64,
    max_token_len: u64,
}

impl<R: Read> TokenReader<R> {
    /// Creates a reader with no limit on token length.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            max_token_len: u64::MAX,
        }
    }

    /// Sets the largest string token the reader will accept.
    pub fn with_max_token_len(mut self, max_token_len: u64) -> Self {
        self.max_token_len = max_token_len;
        self
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Consumes the token reader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads exactly `buf.len()` bytes.
    fn read_exact_tracked(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.position;
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::TruncatedStream {
                offset,
                wanted: buf.len() as u64,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads a raw 8-byte little-endian integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedStream`] if fewer than 8 bytes remain.
    pub fn read_fixed_int(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_tracked(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a length-prefixed string token and discards its padding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedStream`] if the stream ends inside the
    /// token and [`Error::TokenTooLarge`] if the declared length exceeds the
    /// configured limit.
    pub fn read_string(&mut self) -> Result<Vec<u8>> {
        let prefix_offset = self.position;
        let len = self.read_fixed_int()?;

        if len > self.max_token_len {
            return Err(Error::TokenTooLarge {
                offset: prefix_offset,
                len,
                limit: self.max_token_len,
            });
        }
        if usize::try_from(len).is_err() {
            return Err(Error::TokenTooLarge {
                offset: prefix_offset,
                len,
                limit: usize::MAX as u64,
            });
        }

        let data_offset = self.position;
        let mut buf = Vec::with_capacity(len.min(INITIAL_TOKEN_CAPACITY) as usize);
        let read = (&mut self.inner).take(len).read_to_end(&mut buf)?;
        self.position += read as u64;
        if (read as u64) < len {
            return Err(Error::TruncatedStream {
                offset: data_offset,
                wanted: len,
            });
        }

        let pad = padding_len(len) as usize;
        if pad > 0 {
            let mut padding = [0u8; 8];
            self.read_exact_tracked(&mut padding[..pad])?;
        }

        Ok(buf)
    }

    /// Reads a string token and checks that it equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedToken`] on mismatch, or any error from
    /// [`read_string`](Self::read_string).
    pub fn expect(&mut self, expected: &[u8]) -> Result<()> {
        let offset = self.position;
        let actual = self.read_string()?;
        if actual != expected {
            return Err(Error::unexpected_token(expected, &actual, offset));
        }
        Ok(())
    }

    /// Returns `true` if the underlying stream has no more bytes.
    ///
    /// A byte read while probing counts as consumed.
    pub fn at_end(&mut self) -> Result<bool> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(true),
                Ok(n) => {
                    self.position += n as u64;
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
