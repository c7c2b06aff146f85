//! NAR wire format constants and token-level reading and writing.
//!
//! A NAR is a flat sequence of tokens. Every token is a byte string preceded
//! by its length as an 8-byte little-endian integer and followed by zero
//! padding up to the next multiple of 8 bytes:
//!
//! ```text
//! +----------------+-------------------+---------------+
//! | len: u64 (LE)  | bytes[len]        | 0x00 * pad    |
//! +----------------+-------------------+---------------+
//!                    pad = (8 - len % 8) % 8
//! ```
//!
//! The tree structure is expressed entirely with keyword tokens such as
//! `"("`, `"type"` and `"entry"`; see [`crate::process`] for the grammar.

pub mod reader;
pub mod writer;

pub use reader::TokenReader;
pub use writer::TokenWriter;

/// Width of the length prefix and the alignment of every token.
pub const ALIGNMENT: u64 = 8;

/// Magic header token that opens every archive.
pub const NAR_VERSION_MAGIC: &[u8] = b"nix-archive-1";

/// Keyword tokens of the NAR grammar.
pub mod token {
    /// Opens a node or a directory entry.
    pub const OPEN: &[u8] = b"(";
    /// Closes a node or a directory entry.
    pub const CLOSE: &[u8] = b")";
    /// Precedes the node type tag.
    pub const TYPE: &[u8] = b"type";
    /// Regular file type tag.
    pub const REGULAR: &[u8] = b"regular";
    /// Symbolic link type tag.
    pub const SYMLINK: &[u8] = b"symlink";
    /// Directory type tag.
    pub const DIRECTORY: &[u8] = b"directory";
    /// Marks a regular file as executable; always followed by an empty token.
    pub const EXECUTABLE: &[u8] = b"executable";
    /// Precedes the content of a regular file.
    pub const CONTENTS: &[u8] = b"contents";
    /// Precedes the target of a symbolic link.
    pub const TARGET: &[u8] = b"target";
    /// Starts a directory entry.
    pub const ENTRY: &[u8] = b"entry";
    /// Precedes the name of a directory entry.
    pub const NAME: &[u8] = b"name";
    /// Precedes the node of a directory entry.
    pub const NODE: &[u8] = b"node";
}

/// Returns the number of zero bytes that follow a string of `len` bytes.
#[inline]
pub fn padding_len(len: u64) -> u64 {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// Returns the total encoded size of a string token with `len` payload bytes.
#[inline]
pub fn encoded_len(len: u64) -> u64 {
    ALIGNMENT + len + padding_len(len)
}
