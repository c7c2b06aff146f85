//! Script interpreter (`#!` line) rewriting.

use std::borrow::Cow;

use super::{PatchContext, contains, replace_all};

/// Marker that opens a script's interpreter line.
pub const SHEBANG: &[u8] = b"#!";

/// Prefixes store paths on the first line of a script.
///
/// Only the first line, up to and including the first line feed, is
/// inspected. Store paths in the script body are left alone. If the prefix
/// already appears on the first line the content is returned unchanged.
///
/// Content that does not start with `#!` is returned unchanged.
///
/// ```rust
/// use narpatch::{PatchContext, patch::rewrite_shebang};
///
/// let ctx = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build()?;
/// let out = rewrite_shebang(&ctx, b"#!/nix/store/abc/bin/bash\necho /nix/store/xyz\n");
/// assert_eq!(
///     out.as_ref(),
///     b"#!/data/x/nix/store/abc/bin/bash\necho /nix/store/xyz\n"
/// );
/// # Ok::<(), narpatch::Error>(())
/// ```
pub fn rewrite_shebang<'a>(ctx: &PatchContext, content: &'a [u8]) -> Cow<'a, [u8]> {
    if !content.starts_with(SHEBANG) {
        return Cow::Borrowed(content);
    }

    let line_end = content
        .iter()
        .position(|&b| b == b'\n')
        .map_or(content.len(), |pos| pos + 1);
    let (line, rest) = content.split_at(line_end);

    let store = ctx.store_dir().as_bytes();
    if contains(line, ctx.prefix().as_bytes()) || !contains(line, store) {
        return Cow::Borrowed(content);
    }

    let mut rewritten = replace_all(line, store, ctx.prefixed_store_dir().as_bytes());
    rewritten.extend_from_slice(rest);
    Cow::Owned(rewritten)
}
