//! Executable header rewriting.
//!
//! Dynamically linked executables carry two absolute paths that must move
//! under the prefix: the interpreter (the dynamic loader) and the RPATH
//! entries pointing into the store. The actual editing is delegated to an
//! [`ExecutableTool`].

use super::{PatchContext, contains};
use crate::{Error, Result};
use crate::tool::{EditRequest, ExecutableTool, Query};

/// The 4-byte magic number that opens every ELF file.
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Section name whose presence suggests a dynamic section.
const DYNAMIC_MARKER: &[u8] = b".dynamic";

/// Section name whose presence suggests an interpreter section.
const INTERP_MARKER: &[u8] = b".interp";

/// Separator between RPATH entries.
const RPATH_SEPARATOR: char = ':';

/// Returns `true` if `content` starts with the ELF magic number.
pub fn is_elf(content: &[u8]) -> bool {
    content.starts_with(ELF_MAGIC)
}

/// Cheap check for dynamic linking.
///
/// Scans the raw bytes for the `.dynamic` or `.interp` section names. This
/// is a heuristic, not a parse of the section header table: a stripped
/// binary without a section string table is missed, and a static binary that
/// happens to contain either string is let through to the tool, which then
/// rejects it.
pub fn looks_dynamic(content: &[u8]) -> bool {
    contains(content, DYNAMIC_MARKER) || contains(content, INTERP_MARKER)
}

/// Result of running the ELF rule on one file.
#[derive(Debug)]
pub enum ElfPatch {
    /// Neither section marker was found; the tool was not consulted.
    NotDynamic,
    /// The tool was consulted and nothing needed to change.
    UpToDate,
    /// The tool applied the edits; this is the new content.
    Patched(Vec<u8>),
    /// The tool failed to read or edit the file; the original content stands.
    ToolFailed(Error),
}

impl ElfPatch {
    /// Returns the content to emit, falling back to `original`.
    pub fn into_content(self, original: Vec<u8>) -> Vec<u8> {
        match self {
            ElfPatch::Patched(content) => content,
            _ => original,
        }
    }
}

/// Computes the RPATH an executable should carry under the prefix.
///
/// First the configured old glibc and gcc-lib store paths are replaced by the
/// new ones. Then every `:`-separated entry that starts with the store root
/// gets the prefix. Entries already under the prefix, and entries outside the
/// store such as `$ORIGIN/../lib`, are kept as they are.
///
/// ```rust
/// use narpatch::{PatchContext, patch::rewrite_rpath};
///
/// let ctx = PatchContext::builder("/p", "/nix/store/new-glibc", "/nix/store/new-gcc")
///     .old_glibc("/nix/store/old-glibc")
///     .build()?;
/// assert_eq!(
///     rewrite_rpath(&ctx, "/nix/store/old-glibc/lib:$ORIGIN/../lib"),
///     "/p/nix/store/new-glibc/lib:$ORIGIN/../lib"
/// );
/// # Ok::<(), narpatch::Error>(())
/// ```
pub fn rewrite_rpath(ctx: &PatchContext, rpath: &str) -> String {
    let mut substituted = rpath.to_string();
    if let Some(old) = ctx.old_glibc() {
        substituted = substituted.replace(old, ctx.glibc());
    }
    if let Some(old) = ctx.old_gcc_lib() {
        substituted = substituted.replace(old, ctx.gcc_lib());
    }

    let store = ctx.store_dir();
    substituted
        .split(RPATH_SEPARATOR)
        .map(|entry| {
            if entry.starts_with(store) {
                format!("{}{}", ctx.prefix(), entry)
            } else {
                entry.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(&RPATH_SEPARATOR.to_string())
}

/// Unwraps a query answer, turning a tool failure into an error.
///
/// Absent and unsupported fields are logged and yield `None`.
fn query_value(field: &str, query: Query) -> Result<Option<String>> {
    match query {
        Query::Found(value) => Ok(Some(value)),
        Query::Absent => {
            log::debug!("executable has no {}", field);
            Ok(None)
        }
        Query::Unsupported(reason) => {
            log::debug!("tool cannot read {} of executable: {}", field, reason);
            Ok(None)
        }
        Query::Failed(e) => Err(e),
    }
}

/// Works out which edits an executable needs.
///
/// # Errors
///
/// Returns the tool's error if either query fails outright. An absent or
/// unsupported field is not an error; it just contributes no edit.
pub fn plan_edits<T: ExecutableTool + ?Sized>(
    ctx: &PatchContext,
    tool: &T,
    content: &[u8],
) -> Result<EditRequest> {
    let mut request = EditRequest::new();

    if let Some(current) = query_value("interpreter", tool.interpreter(content))? {
        if !current.contains(ctx.prefix()) {
            request = request.interpreter(ctx.interpreter_path());
        }
    }

    if let Some(current) = query_value("RPATH", tool.rpath(content))? {
        if current.contains(ctx.store_dir()) {
            let rewritten = rewrite_rpath(ctx, &current);
            if rewritten != current {
                request = request.rpath(rewritten);
            }
        }
    }

    Ok(request)
}

/// Moves an executable's interpreter and RPATH under the prefix.
///
/// Content that does not look dynamically linked is left alone without
/// consulting the tool. A tool failure is reported as
/// [`ElfPatch::ToolFailed`]; it never aborts the run.
pub fn rewrite_executable<T: ExecutableTool + ?Sized>(
    ctx: &PatchContext,
    tool: &T,
    content: &[u8],
) -> ElfPatch {
    if !looks_dynamic(content) {
        return ElfPatch::NotDynamic;
    }

    let request = match plan_edits(ctx, tool, content) {
        Ok(request) => request,
        Err(e) => return ElfPatch::ToolFailed(e),
    };
    if request.is_empty() {
        return ElfPatch::UpToDate;
    }

    log::debug!(
        "patching executable: interpreter={:?} rpath={:?}",
        request.interpreter,
        request.rpath
    );
    match tool.apply(content, &request) {
        Ok(patched) => ElfPatch::Patched(patched),
        Err(e) => ElfPatch::ToolFailed(e),
    }
}
