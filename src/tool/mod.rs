//! Executable-editing tool adapter.
//!
//! The ELF rule never edits binaries itself. It asks an [`ExecutableTool`]
//! what an executable's interpreter and RPATH are, and asks it to change
//! them. [`Patchelf`] implements the trait on top of the `patchelf` program;
//! [`NoTool`] turns executable patching off.
//!
//! Query results are reported as a [`Query`] so that "the binary has no
//! interpreter" stays distinguishable from "the tool could not be run".

mod patchelf;

pub use patchelf::Patchelf;

use crate::{Error, Result};

/// Outcome of asking the tool for a field of an executable.
#[derive(Debug)]
pub enum Query {
    /// The tool reported a value.
    Found(String),
    /// The tool ran and the executable has no such field, or it is empty.
    Absent,
    /// The tool ran and rejected the executable (static, corrupt, ...).
    Unsupported(String),
    /// The tool could not be run or failed unexpectedly.
    Failed(Error),
}

impl Query {
    /// Returns the value if one was found.
    pub fn found(&self) -> Option<&str> {
        match self {
            Query::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// A set of edits to apply to one executable in a single tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditRequest {
    /// New interpreter path.
    pub interpreter: Option<String>,
    /// New RPATH value.
    pub rpath: Option<String>,
}

impl EditRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a new interpreter.
    pub fn interpreter(mut self, path: impl Into<String>) -> Self {
        self.interpreter = Some(path.into());
        self
    }

    /// Requests a new RPATH.
    pub fn rpath(mut self, value: impl Into<String>) -> Self {
        self.rpath = Some(value.into());
        self
    }

    /// Returns `true` if the request changes nothing.
    pub fn is_empty(&self) -> bool {
        self.interpreter.is_none() && self.rpath.is_none()
    }
}

/// Reads and edits the dynamic-linking headers of executables.
///
/// Implementations receive the whole file content and must not keep any
/// resource they acquired for a call once it returns.
pub trait ExecutableTool {
    /// Returns the executable's interpreter (`PT_INTERP`) path.
    fn interpreter(&self, content: &[u8]) -> Query;

    /// Returns the executable's RPATH (or RUNPATH).
    fn rpath(&self, content: &[u8]) -> Query;

    /// Applies `request` and returns the edited content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if the tool rejects the request.
    fn apply(&self, content: &[u8], request: &EditRequest) -> Result<Vec<u8>>;

    /// Sets the interpreter path.
    fn set_interpreter(&self, content: &[u8], path: &str) -> Result<Vec<u8>> {
        self.apply(content, &EditRequest::new().interpreter(path))
    }

    /// Sets the RPATH.
    fn set_rpath(&self, content: &[u8], value: &str) -> Result<Vec<u8>> {
        self.apply(content, &EditRequest::new().rpath(value))
    }
}

impl<T: ExecutableTool + ?Sized> ExecutableTool for &T {
    fn interpreter(&self, content: &[u8]) -> Query {
        (**self).interpreter(content)
    }

    fn rpath(&self, content: &[u8]) -> Query {
        (**self).rpath(content)
    }

    fn apply(&self, content: &[u8], request: &EditRequest) -> Result<Vec<u8>> {
        (**self).apply(content, request)
    }
}

impl<T: ExecutableTool + ?Sized> ExecutableTool for Box<T> {
    fn interpreter(&self, content: &[u8]) -> Query {
        (**self).interpreter(content)
    }

    fn rpath(&self, content: &[u8]) -> Query {
        (**self).rpath(content)
    }

    fn apply(&self, content: &[u8], request: &EditRequest) -> Result<Vec<u8>> {
        (**self).apply(content, request)
    }
}

/// A tool that leaves every executable alone.
///
/// Queries report [`Query::Unsupported`], so the ELF rule never issues an
/// edit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTool;

impl ExecutableTool for NoTool {
    fn interpreter(&self, _content: &[u8]) -> Query {
        Query::Unsupported("executable patching disabled".into())
    }

    fn rpath(&self, _content: &[u8]) -> Query {
        Query::Unsupported("executable patching disabled".into())
    }

    fn apply(&self, _content: &[u8], _request: &EditRequest) -> Result<Vec<u8>> {
        Err(Error::Tool("executable patching disabled".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_request_builder() {
        let request = EditRequest::new();
        assert!(request.is_empty());

        let request = request.interpreter("/p/ld.so").rpath("/p/lib");
        assert!(!request.is_empty());
        assert_eq!(request.interpreter.as_deref(), Some("/p/ld.so"));
        assert_eq!(request.rpath.as_deref(), Some("/p/lib"));
    }

    #[test]
    fn test_query_found() {
        assert_eq!(Query::Found("/lib/ld.so".into()).found(), Some("/lib/ld.so"));
        assert_eq!(Query::Absent.found(), None);
    }

    #[test]
    fn test_no_tool_never_edits() {
        let tool = NoTool;
        assert!(matches!(tool.interpreter(b"\x7fELF"), Query::Unsupported(_)));
        assert!(matches!(tool.rpath(b"\x7fELF"), Query::Unsupported(_)));
        let err = tool.set_rpath(b"\x7fELF", "/x").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_boxed_tool_delegates() {
        let tool: Box<dyn ExecutableTool> = Box::new(NoTool);
        assert!(matches!(tool.interpreter(b""), Query::Unsupported(_)));
        assert!(tool.set_interpreter(b"", "/x").is_err());
    }
}
