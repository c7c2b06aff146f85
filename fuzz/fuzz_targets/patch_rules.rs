//! Fuzz target for the symlink and shebang rules.
//!
//! Both rules must be idempotent on arbitrary bytes.
//!
//! Run with: cargo +nightly fuzz run patch_rules

#![no_main]

use libfuzzer_sys::fuzz_target;
use narpatch::PatchContext;
use narpatch::patch::{rewrite_shebang, rewrite_symlink_target};

fuzz_target!(|data: &[u8]| {
    let Ok(ctx) = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build() else {
        return;
    };

    let once = rewrite_symlink_target(&ctx, data);
    assert_eq!(rewrite_symlink_target(&ctx, &once), once);

    let once = rewrite_shebang(&ctx, data);
    assert_eq!(rewrite_shebang(&ctx, &once), once);
});
