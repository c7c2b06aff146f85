//! [`ExecutableTool`] backed by the `patchelf` program.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::NamedTempFile;

use super::{EditRequest, ExecutableTool, Query};
use crate::{Error, Result};

/// Runs `patchelf` against scratch copies of executables.
///
/// Every call writes the content to a fresh temporary file, runs the tool on
/// it and, for edits, reads the result back. The temporary file is removed
/// when the call returns, whether the tool succeeded or not.
#[derive(Debug, Clone)]
pub struct Patchelf {
    program: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl Default for Patchelf {
    fn default() -> Self {
        Self::new("patchelf")
    }
}

impl Patchelf {
    /// Uses `program` as the patchelf executable.
    ///
    /// A bare name is looked up in `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            scratch_dir: None,
        }
    }

    /// Creates scratch files in `dir` instead of the system temp directory.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Returns the program this adapter runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Copies `content` into a new executable temporary file.
    fn scratch(&self, content: &[u8]) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("narpatch-").suffix(".elf");
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(content)?;
        file.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(file)
    }

    fn run(&self, args: &[OsString], path: &Path) -> io::Result<Output> {
        log::trace!("running {} {:?} {}", self.program.display(), args, path.display());
        Command::new(&self.program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
    }

    fn spawn_error(&self, e: io::Error) -> Error {
        Error::Tool(format!("failed to run {}: {}", self.program.display(), e))
    }

    /// Runs a `--print-*` option and classifies the result.
    fn print(&self, option: &str, content: &[u8]) -> Query {
        let scratch = match self.scratch(content) {
            Ok(file) => file,
            Err(e) => return Query::Failed(Error::Io(e)),
        };

        let output = match self.run(&[OsString::from(option)], scratch.path()) {
            Ok(output) => output,
            Err(e) => return Query::Failed(self.spawn_error(e)),
        };

        if !output.status.success() {
            return Query::Unsupported(stderr_message(&output));
        }

        match String::from_utf8(output.stdout) {
            Ok(value) => {
                let value = value.trim();
                if value.is_empty() {
                    Query::Absent
                } else {
                    Query::Found(value.to_string())
                }
            }
            Err(_) => Query::Failed(Error::Tool(format!(
                "{} {} printed non-UTF-8 output",
                self.program.display(),
                option
            ))),
        }
    }
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    match output.status.code() {
        Some(code) if stderr.is_empty() => format!("exit code {}", code),
        Some(code) => format!("exit code {}: {}", code, stderr),
        None if stderr.is_empty() => "terminated by signal".to_string(),
        None => format!("terminated by signal: {}", stderr),
    }
}

impl ExecutableTool for Patchelf {
    fn interpreter(&self, content: &[u8]) -> Query {
        self.print("--print-interpreter", content)
    }

    fn rpath(&self, content: &[u8]) -> Query {
        self.print("--print-rpath", content)
    }

    fn apply(&self, content: &[u8], request: &EditRequest) -> Result<Vec<u8>> {
        if request.is_empty() {
            return Ok(content.to_vec());
        }

        let mut args = Vec::new();
        if let Some(interpreter) = &request.interpreter {
            args.push(OsString::from("--set-interpreter"));
            args.push(OsString::from(interpreter));
        }
        if let Some(rpath) = &request.rpath {
            args.push(OsString::from("--set-rpath"));
            args.push(OsString::from(rpath));
        }

        let scratch = self.scratch(content)?;
        let output = self
            .run(&args, scratch.path())
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(Error::Tool(format!(
                "{} rejected edit: {}",
                self.program.display(),
                stderr_message(&output)
            )));
        }

        Ok(std::fs::read(scratch.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MISSING: &str = "/nonexistent/narpatch-test/patchelf";

    fn scratch_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_missing_program_is_a_failure_not_absence() {
        let dir = TempDir::new().unwrap();
        let tool = Patchelf::new(MISSING).scratch_dir(dir.path());

        assert!(matches!(tool.interpreter(b"\x7fELF"), Query::Failed(Error::Tool(_))));
        assert!(matches!(tool.rpath(b"\x7fELF"), Query::Failed(Error::Tool(_))));
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_failed_apply_releases_scratch_file() {
        let dir = TempDir::new().unwrap();
        let tool = Patchelf::new(MISSING).scratch_dir(dir.path());

        let err = tool.set_interpreter(b"\x7fELF", "/p/ld.so").unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[test]
    fn test_empty_request_skips_tool() {
        let tool = Patchelf::new(MISSING);
        let out = tool.apply(b"\x7fELF data", &EditRequest::new()).unwrap();
        assert_eq!(out, b"\x7fELF data");
    }

    #[test]
    fn test_scratch_file_holds_content() {
        let dir = TempDir::new().unwrap();
        let tool = Patchelf::default().scratch_dir(dir.path());
        let file = tool.scratch(b"content").unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"content");
        assert_eq!(scratch_files(dir.path()), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = file.as_file().metadata().unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        drop(file);
        assert_eq!(scratch_files(dir.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_unsupported() {
        // `false` ignores its arguments and exits 1, like patchelf on a static binary.
        let tool = Patchelf::new("false");
        match tool.interpreter(b"\x7fELF") {
            Query::Unsupported(message) => assert!(message.contains("exit code 1")),
            other => panic!("unexpected query result: {other:?}"),
        }
    }
}
