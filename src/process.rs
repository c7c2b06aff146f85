//! The streaming NAR patcher.
//!
//! [`Patcher`] reads an archive token by token, hands each node's payload to
//! the matching rule in [`crate::patch`] and writes the result straight back
//! out. Only one node's content is held in memory at a time.
//!
//! # Grammar
//!
//! ```text
//! Archive     := "nix-archive-1" Node
//! Node        := "(" "type" TypeTag Body ")"
//! TypeTag     := "regular" | "symlink" | "directory"
//! RegularBody := ["executable" ""] "contents" Content
//! SymlinkBody := "target" Target
//! DirBody     := Entry*
//! Entry       := "entry" "(" "name" Name "node" Node ")"
//! ```
//!
//! A directory has no entry count and no end marker of its own: the `")"`
//! that ends its entry list is the `")"` that closes the directory node. The
//! entry loop therefore reads that terminator as lookahead and reports it
//! back through [`NodeEnd`], so the caller knows not to read it again.

use std::borrow::Cow;
use std::io::{Read, Write};

use crate::format::{NAR_VERSION_MAGIC, TokenReader, TokenWriter, token};
use crate::patch::elf::{self, ElfPatch};
use crate::patch::script::{self, SHEBANG};
use crate::patch::{PatchContext, symlink};
use crate::report::PatchReport;
use crate::tool::ExecutableTool;
use crate::{Error, Result};

/// How a node body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeEnd {
    /// The closing `")"` is still in the stream.
    Open,
    /// The closing `")"` was consumed while looking for the next entry.
    Closed,
}

/// Patches NAR archives for a fixed configuration.
///
/// A `Patcher` holds no per-archive state; [`process`](Self::process) may be
/// called any number of times, and concurrently from several threads when
/// the tool is `Sync`.
///
/// # Example
///
/// ```rust
/// use narpatch::{NoTool, PatchContext, Patcher};
///
/// let ctx = PatchContext::builder("/data/x", "/nix/store/g", "/nix/store/c").build()?;
/// let patcher = Patcher::new(ctx, NoTool);
///
/// # let input: Vec<u8> = {
/// #     let mut w = narpatch::format::TokenWriter::new(Vec::new());
/// #     let tokens: [&[u8]; 7] =
/// #         [b"nix-archive-1", b"(", b"type", b"symlink", b"target", b"/nix/store/abc", b")"];
/// #     for t in tokens {
/// #         w.write_string(t)?;
/// #     }
/// #     w.into_inner()
/// # };
/// let mut output = Vec::new();
/// let report = patcher.process(&input[..], &mut output)?;
/// assert_eq!(report.symlinks_rewritten, 1);
/// # Ok::<(), narpatch::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Patcher<T> {
    ctx: PatchContext,
    tool: T,
    max_token_len: u64,
}

impl<T: ExecutableTool> Patcher<T> {
    /// Creates a patcher that edits executables with `tool`.
    pub fn new(ctx: PatchContext, tool: T) -> Self {
        Self {
            ctx,
            tool,
            max_token_len: u64::MAX,
        }
    }

    /// Rejects string tokens longer than `limit` bytes.
    ///
    /// File contents are tokens too, so this bounds the largest file the
    /// patcher will buffer.
    pub fn max_token_len(mut self, limit: u64) -> Self {
        self.max_token_len = limit;
        self
    }

    /// Returns the patch configuration.
    pub fn context(&self) -> &PatchContext {
        &self.ctx
    }

    /// Reads an archive from `input` and writes the patched archive to `output`.
    ///
    /// # Errors
    ///
    /// Any grammar violation or I/O error aborts the run. Output written up
    /// to that point is not a valid archive.
    pub fn process<R: Read, W: Write>(&self, input: R, output: W) -> Result<PatchReport> {
        let mut session = Session {
            reader: TokenReader::new(input).with_max_token_len(self.max_token_len),
            writer: TokenWriter::new(output),
            ctx: &self.ctx,
            tool: &self.tool,
            report: PatchReport::default(),
        };

        session.reader.expect(NAR_VERSION_MAGIC)?;
        session.writer.write_string(NAR_VERSION_MAGIC)?;

        session.node("")?;

        let end = session.reader.position();
        if !session.reader.at_end()? {
            return Err(Error::TrailingData { offset: end });
        }
        session.writer.flush()?;

        let mut report = session.report;
        report.bytes_read = end;
        report.bytes_written = session.writer.bytes_written();
        log::debug!(
            "patched {} nodes ({} changed), {} -> {} bytes",
            report.total_nodes(),
            report.files_changed(),
            report.bytes_read,
            report.bytes_written
        );
        Ok(report)
    }
}

/// State of a single [`Patcher::process`] call.
struct Session<'a, R, W, T: ?Sized> {
    reader: TokenReader<R>,
    writer: TokenWriter<W>,
    ctx: &'a PatchContext,
    tool: &'a T,
    report: PatchReport,
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

/// Returns the new bytes if a rule changed anything.
fn changed(rewritten: Cow<'_, [u8]>) -> Option<Vec<u8>> {
    match rewritten {
        Cow::Owned(bytes) => Some(bytes),
        Cow::Borrowed(_) => None,
    }
}

impl<R: Read, W: Write, T: ExecutableTool + ?Sized> Session<'_, R, W, T> {
    /// Reads `expected` and writes it back out.
    fn copy_token(&mut self, expected: &[u8]) -> Result<()> {
        self.reader.expect(expected)?;
        self.writer.write_string(expected)
    }

    /// Processes one node, from its `"("` to its `")"`.
    fn node(&mut self, path: &str) -> Result<()> {
        self.copy_token(token::OPEN)?;
        self.copy_token(token::TYPE)?;

        let tag_offset = self.reader.position();
        let tag = self.reader.read_string()?;
        let end = match tag.as_slice() {
            token::REGULAR => {
                self.writer.write_string(token::REGULAR)?;
                self.regular(path)?
            }
            token::SYMLINK => {
                self.writer.write_string(token::SYMLINK)?;
                self.symlink(path)?
            }
            token::DIRECTORY => {
                self.writer.write_string(token::DIRECTORY)?;
                self.directory(path)?
            }
            _ => return Err(Error::unknown_node_type(&tag, tag_offset)),
        };

        if end == NodeEnd::Open {
            self.reader.expect(token::CLOSE)?;
        }
        self.writer.write_string(token::CLOSE)
    }

    fn regular(&mut self, path: &str) -> Result<NodeEnd> {
        self.report.regular_files += 1;

        let mut marker_offset = self.reader.position();
        let mut marker = self.reader.read_string()?;
        if marker == token::EXECUTABLE {
            self.report.executables += 1;
            self.writer.write_string(token::EXECUTABLE)?;
            self.copy_token(b"")?;
            marker_offset = self.reader.position();
            marker = self.reader.read_string()?;
        }
        if marker != token::CONTENTS {
            return Err(Error::unexpected_token(token::CONTENTS, &marker, marker_offset));
        }

        let content = self.reader.read_string()?;
        let content = self.patch_content(path, content);

        self.writer.write_string(token::CONTENTS)?;
        self.writer.write_string(&content)?;
        Ok(NodeEnd::Open)
    }

    /// Runs the script or ELF rule, whichever the content's magic selects.
    fn patch_content(&mut self, path: &str, content: Vec<u8>) -> Vec<u8> {
        if content.starts_with(SHEBANG) {
            return match changed(script::rewrite_shebang(self.ctx, &content)) {
                Some(rewritten) => {
                    log::debug!("{}: rewrote script interpreter", display_path(path));
                    self.report.scripts_rewritten += 1;
                    rewritten
                }
                None => content,
            };
        }

        if !elf::is_elf(&content) {
            return content;
        }

        self.report.elf_files += 1;
        let patch = elf::rewrite_executable(self.ctx, self.tool, &content);
        match &patch {
            ElfPatch::NotDynamic => self.report.elf_static += 1,
            ElfPatch::UpToDate => {}
            ElfPatch::Patched(_) => {
                log::debug!("{}: patched executable", display_path(path));
                self.report.elf_patched += 1;
            }
            ElfPatch::ToolFailed(e) => {
                log::warn!("{}: leaving executable unpatched: {}", display_path(path), e);
                self.report.elf_failures.push(display_path(path).to_string());
            }
        }
        patch.into_content(content)
    }

    fn symlink(&mut self, path: &str) -> Result<NodeEnd> {
        self.report.symlinks += 1;
        self.copy_token(token::TARGET)?;

        let target = self.reader.read_string()?;
        match changed(symlink::rewrite_symlink_target(self.ctx, &target)) {
            Some(rewritten) => {
                log::debug!("{}: rewrote symlink target", display_path(path));
                self.report.symlinks_rewritten += 1;
                self.writer.write_string(&rewritten)?;
            }
            None => self.writer.write_string(&target)?,
        }
        Ok(NodeEnd::Open)
    }

    /// Processes directory entries up to and including the node's `")"`.
    fn directory(&mut self, path: &str) -> Result<NodeEnd> {
        self.report.directories += 1;

        loop {
            let offset = self.reader.position();
            let next = self.reader.read_string()?;
            match next.as_slice() {
                token::CLOSE => return Ok(NodeEnd::Closed),
                token::ENTRY => {}
                _ => return Err(Error::unexpected_token(token::ENTRY, &next, offset)),
            }

            self.writer.write_string(token::ENTRY)?;
            self.copy_token(token::OPEN)?;
            self.copy_token(token::NAME)?;
            let name = self.reader.read_string()?;
            self.writer.write_string(&name)?;
            self.copy_token(token::NODE)?;

            let child = format!("{}/{}", path, String::from_utf8_lossy(&name));
            self.node(&child)?;

            self.copy_token(token::CLOSE)?;
        }
    }
}
