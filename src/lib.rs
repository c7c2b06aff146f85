//! # narpatch
//!
//! A streaming rewriter for Nix archives (NAR) that relocates packages under
//! an alternate installation prefix.
//!
//! A NAR serializes a filesystem tree into a single self-delimiting byte
//! stream. Packages built for `/nix/store` embed absolute store paths in
//! symlink targets, script interpreter lines and executable headers. This
//! crate reads an archive, moves those paths under a prefix such as
//! `/data/x` (so `/nix/store/abc` becomes `/data/x/nix/store/abc`) and writes
//! a structurally identical archive in a single forward pass.
//!
//! ## Quick Start
//!
//! ### Patching an Archive
//!
//! ```rust,no_run
//! use narpatch::{Patchelf, PatchContext, Patcher, Result};
//! use std::io;
//!
//! fn main() -> Result<()> {
//!     let ctx = PatchContext::builder(
//!         "/data/x",
//!         "/nix/store/7xz-glibc-2.40",
//!         "/nix/store/3kq-gcc-14-lib",
//!     )
//!     .old_glibc("/nix/store/1ab-glibc-2.39")
//!     .build()?;
//!
//!     let patcher = Patcher::new(ctx, Patchelf::default());
//!     let report = patcher.process(io::stdin().lock(), io::stdout().lock())?;
//!     eprintln!("{} files changed", report.files_changed());
//!     Ok(())
//! }
//! ```
//!
//! ### Patching Without Executables
//!
//! [`NoTool`] turns the executable rule off; symlinks and scripts are still
//! rewritten and no external program is needed.
//!
//! ```rust,no_run
//! use narpatch::{NoTool, PatchContext, Patcher, Result};
//! use std::fs::File;
//! use std::io::{BufReader, BufWriter};
//!
//! fn main() -> Result<()> {
//!     let ctx = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build()?;
//!     let input = BufReader::new(File::open("package.nar")?);
//!     let output = BufWriter::new(File::create("package.patched.nar")?);
//!     Patcher::new(ctx, NoTool).process(input, output)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Patch Rules
//!
//! | Node | Rule |
//! |------|------|
//! | Symlink | A target under the store root gets the prefix |
//! | Script (`#!`) | Store paths on the first line get the prefix |
//! | ELF executable | Interpreter and RPATH move under the prefix, via [`ExecutableTool`] |
//!
//! Every rule is idempotent: content already under the prefix is left alone,
//! so patching a patched archive changes nothing.
//!
//! ## Error Handling
//!
//! Structural problems in the input abort the run:
//!
//! ```rust
//! use narpatch::{Error, NoTool, PatchContext, Patcher};
//!
//! let ctx = PatchContext::builder("/p", "/nix/store/g", "/nix/store/c").build()?;
//! let patcher = Patcher::new(ctx, NoTool);
//!
//! match patcher.process(&b"not a nar"[..], Vec::new()) {
//!     Err(e) if e.is_grammar_error() => println!("bad archive: {}", e),
//!     Err(e) => println!("failed: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! # Ok::<(), Error>(())
//! ```
//!
//! A failure of the executable tool is not fatal: the affected file is
//! emitted unchanged and its path is listed in
//! [`PatchReport::elf_failures`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `serde` | Yes | `Serialize` for [`PatchReport`] |
//! | `cli` | No | The `narpatch` command-line tool |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod format;
pub mod patch;
pub mod process;
pub mod report;
pub mod tool;

pub use error::{Error, Result};

pub use format::{TokenReader, TokenWriter};

pub use patch::{PatchContext, PatchContextBuilder};

pub use process::Patcher;

pub use report::PatchReport;

pub use tool::{EditRequest, ExecutableTool, NoTool, Patchelf, Query};
