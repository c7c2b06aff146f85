//! Symlink target rewriting.

use std::borrow::Cow;

use super::PatchContext;

/// Moves a symlink target that points into the store under the prefix.
///
/// Targets that already start with the prefix are returned unchanged, so
/// patching an already patched archive is a no-op. Targets outside the store
/// (relative links, `/usr/bin/env`, ...) are never touched.
///
/// ```rust
/// use narpatch::{PatchContext, patch::rewrite_symlink_target};
///
/// let ctx = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build()?;
/// assert_eq!(
///     rewrite_symlink_target(&ctx, b"/nix/store/abc/bin").as_ref(),
///     b"/data/x/nix/store/abc/bin"
/// );
/// assert_eq!(rewrite_symlink_target(&ctx, b"../lib").as_ref(), b"../lib");
/// # Ok::<(), narpatch::Error>(())
/// ```
pub fn rewrite_symlink_target<'a>(ctx: &PatchContext, target: &'a [u8]) -> Cow<'a, [u8]> {
    let prefix = ctx.prefix().as_bytes();
    if target.starts_with(prefix) {
        return Cow::Borrowed(target);
    }
    if !target.starts_with(ctx.store_dir().as_bytes()) {
        return Cow::Borrowed(target);
    }

    let mut rewritten = Vec::with_capacity(prefix.len() + target.len());
    rewritten.extend_from_slice(prefix);
    rewritten.extend_from_slice(target);
    Cow::Owned(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PatchContext {
        PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c")
            .build()
            .unwrap()
    }

    #[test]
    fn test_store_target_is_prefixed() {
        let out = rewrite_symlink_target(&ctx(), b"/nix/store/abc/bin");
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(out.as_ref(), b"/data/x/nix/store/abc/bin");
    }

    #[test]
    fn test_prefixed_target_is_unchanged() {
        let out = rewrite_symlink_target(&ctx(), b"/data/x/nix/store/abc/bin");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_foreign_targets_are_unchanged() {
        let targets: [&[u8]; 4] = [b"/usr/bin/env", b"../lib/libfoo.so.1", b"", b"nix/store/abc"];
        for target in targets {
            let out = rewrite_symlink_target(&ctx(), target);
            assert!(matches!(out, Cow::Borrowed(_)), "{:?}", target);
        }
    }

    #[test]
    fn test_custom_store_dir() {
        let ctx = PatchContext::builder("/p", "/gnu/store/g", "/gnu/store/c")
            .store_dir("/gnu/store")
            .build()
            .unwrap();
        assert_eq!(
            rewrite_symlink_target(&ctx, b"/gnu/store/x").as_ref(),
            b"/p/gnu/store/x"
        );
        assert_eq!(
            rewrite_symlink_target(&ctx, b"/nix/store/x").as_ref(),
            b"/nix/store/x"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let ctx = ctx();
        let once = rewrite_symlink_target(&ctx, b"/nix/store/abc").into_owned();
        let twice = rewrite_symlink_target(&ctx, &once);
        assert_eq!(twice.as_ref(), once.as_slice());
    }
}
