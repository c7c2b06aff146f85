//! Content rewrite rules.
//!
//! Each rule is a stateless function of a [`PatchContext`] and the bytes of
//! one node:
//!
//! - [`symlink`]: prefixes store-path symlink targets
//! - [`script`]: prefixes store paths in a script's `#!` line
//! - [`elf`]: moves an executable's interpreter and RPATH under the prefix
//!
//! The symlink and script rules return [`Cow::Borrowed`](std::borrow::Cow)
//! when nothing changed, so callers can tell a rewrite from a pass-through
//! without comparing buffers.

pub mod context;
pub mod elf;
pub mod script;
pub mod symlink;

pub use context::{DEFAULT_LOADER_NAME, DEFAULT_STORE_DIR, PatchContext, PatchContextBuilder};
pub use elf::{ElfPatch, rewrite_executable, rewrite_rpath};
pub use script::rewrite_shebang;
pub use symlink::rewrite_symlink_target;

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Returns `true` if `needle` occurs anywhere in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Replaces every non-overlapping occurrence of `needle`, scanning left to right.
pub(crate) fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    debug_assert!(!needle.is_empty());

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find(rest, needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}
