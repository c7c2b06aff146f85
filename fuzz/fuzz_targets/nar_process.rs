//! Fuzz target for Patcher::process with arbitrary byte input.
//!
//! Exercises the token reader and the node grammar with malformed or
//! adversarial archives. Executable patching is disabled so no external
//! program runs.
//!
//! Run with: cargo +nightly fuzz run nar_process

#![no_main]

use libfuzzer_sys::fuzz_target;
use narpatch::{NoTool, PatchContext, Patcher};

fuzz_target!(|data: &[u8]| {
    let Ok(ctx) = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build() else {
        return;
    };
    // Bound the largest token so forged lengths cannot exhaust memory.
    let patcher = Patcher::new(ctx, NoTool).max_token_len(1 << 20);

    let mut output = Vec::new();
    if let Ok(report) = patcher.process(data, &mut output) {
        // A valid archive must survive a second pass unchanged in size.
        assert_eq!(report.bytes_read, data.len() as u64);
        let mut again = Vec::new();
        let second = patcher
            .process(&output[..], &mut again)
            .expect("patched output must parse");
        assert_eq!(again, output);
        assert_eq!(second.files_changed(), 0);
    }
});
