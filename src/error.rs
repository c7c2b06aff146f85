//! Error types for NAR patching.
//!
//! This module provides the [`Error`] enum which represents every failure a
//! patch run can hit, along with a convenient [`Result<T>`] type alias.
//!
//! # Fatal and recoverable errors
//!
//! Errors fall into two groups:
//!
//! | Group | Variants | Handling |
//! |-------|----------|----------|
//! | Grammar | [`TruncatedStream`][Error::TruncatedStream], [`UnexpectedToken`][Error::UnexpectedToken], [`UnknownNodeType`][Error::UnknownNodeType], [`TokenTooLarge`][Error::TokenTooLarge], [`TrailingData`][Error::TrailingData] | Abort the run |
//! | Environment | [`Io`][Error::Io], [`InvalidConfig`][Error::InvalidConfig] | Abort the run |
//! | Tool | [`Tool`][Error::Tool] | Recovered by the ELF rule, content left unchanged |
//!
//! A grammar error means the input is not a NAR of the expected shape. Any
//! output already written at that point is not a usable archive.
//!
//! ```rust
//! use narpatch::Error;
//!
//! fn describe(error: &Error) -> &'static str {
//!     if error.is_grammar_error() {
//!         "input is not a valid NAR"
//!     } else if error.is_recoverable() {
//!         "file left unpatched"
//!     } else {
//!         "patch run failed"
//!     }
//! }
//! ```

use std::io;

/// Renders a token for error messages.
///
/// Tokens are arbitrary bytes; printable ASCII is shown as-is and everything
/// else is escaped, truncated to keep messages readable.
pub(crate) fn display_token(token: &[u8]) -> String {
    const MAX_SHOWN: usize = 64;

    let shown = &token[..token.len().min(MAX_SHOWN)];
    let mut out: String = shown.escape_ascii().to_string();
    if token.len() > MAX_SHOWN {
        out.push_str(&format!("... ({} bytes)", token.len()));
    }
    out
}

/// The main error type for NAR patching.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the input or output stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input ended before a required token or byte count.
    #[error("Truncated stream at offset {offset:#x}: wanted {wanted} more bytes")]
    TruncatedStream {
        /// Offset where the short read started.
        offset: u64,
        /// Number of bytes the reader needed.
        wanted: u64,
    },

    /// A token did not match what the grammar requires at this point.
    #[error("Unexpected token at offset {offset:#x}: expected \"{expected}\", got \"{actual}\"")]
    UnexpectedToken {
        /// The token the grammar required.
        expected: String,
        /// The token actually read (escaped).
        actual: String,
        /// Offset of the offending token.
        offset: u64,
    },

    /// A node carried a type tag other than `regular`, `symlink` or `directory`.
    #[error("Unknown node type \"{tag}\" at offset {offset:#x}")]
    UnknownNodeType {
        /// The unrecognized tag (escaped).
        tag: String,
        /// Offset of the tag token.
        offset: u64,
    },

    /// A string token declared a length beyond the configured limit.
    #[error("Token at offset {offset:#x} declares {len} bytes, limit is {limit}")]
    TokenTooLarge {
        /// Offset of the length prefix.
        offset: u64,
        /// The declared length.
        len: u64,
        /// The configured maximum.
        limit: u64,
    },

    /// Bytes followed the closing token of the root node.
    #[error("Trailing data after archive end at offset {offset:#x}")]
    TrailingData {
        /// Offset of the first trailing byte.
        offset: u64,
    },

    /// The executable-editing tool rejected or could not apply a request.
    ///
    /// The ELF rule recovers from this locally by keeping the original
    /// content; it never aborts a run.
    #[error("Executable tool error: {0}")]
    Tool(String),

    /// The patch configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns `true` if the error means the input is not a well-formed NAR.
    pub fn is_grammar_error(&self) -> bool {
        matches!(
            self,
            Error::TruncatedStream { .. }
                | Error::UnexpectedToken { .. }
                | Error::UnknownNodeType { .. }
                | Error::TokenTooLarge { .. }
                | Error::TrailingData { .. }
        )
    }

    /// Returns `true` if processing can continue after this error.
    ///
    /// Only tool failures are recoverable: the affected file is emitted
    /// unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Tool(_))
    }

    /// Returns the input offset associated with this error, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::TruncatedStream { offset, .. }
            | Error::UnexpectedToken { offset, .. }
            | Error::UnknownNodeType { offset, .. }
            | Error::TokenTooLarge { offset, .. }
            | Error::TrailingData { offset } => Some(*offset),
            _ => None,
        }
    }

    /// Creates an UnexpectedToken error from raw tokens.
    pub fn unexpected_token(expected: &[u8], actual: &[u8], offset: u64) -> Self {
        Error::UnexpectedToken {
            expected: display_token(expected),
            actual: display_token(actual),
            offset,
        }
    }

    /// Creates an UnknownNodeType error from a raw tag.
    pub fn unknown_node_type(tag: &[u8], offset: u64) -> Self {
        Error::UnknownNodeType {
            tag: display_token(tag),
            offset,
        }
    }
}

/// A specialized Result type for NAR patching.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(!err.is_grammar_error());
    }

    #[test]
    fn test_unexpected_token_display() {
        let err = Error::unexpected_token(b"contents", b"target", 0x40);
        assert_eq!(
            err.to_string(),
            "Unexpected token at offset 0x40: expected \"contents\", got \"target\""
        );
        assert!(err.is_grammar_error());
        assert_eq!(err.offset(), Some(0x40));
    }

    #[test]
    fn test_unknown_node_type_escapes_bytes() {
        let err = Error::unknown_node_type(b"fifo\x00\xff", 8);
        assert_eq!(
            err.to_string(),
            "Unknown node type \"fifo\\x00\\xff\" at offset 0x8"
        );
    }

    #[test]
    fn test_display_token_truncates() {
        let long = vec![b'a'; 100];
        let shown = display_token(&long);
        assert!(shown.starts_with(&"a".repeat(64)));
        assert!(shown.ends_with("... (100 bytes)"));
    }

    #[test]
    fn test_truncated_stream() {
        let err = Error::TruncatedStream {
            offset: 0x10,
            wanted: 8,
        };
        assert!(err.is_grammar_error());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("0x10"));
    }

    #[test]
    fn test_tool_error_is_recoverable() {
        let err = Error::Tool("patchelf exited with status 1".into());
        assert!(err.is_recoverable());
        assert!(!err.is_grammar_error());
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
