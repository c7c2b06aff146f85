//! Command implementation for the CLI tool.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use narpatch::{
    ExecutableTool, NoTool, PatchContext, PatchReport, Patchelf, Patcher, Result,
};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::create_formatter;

/// Configuration for a patch run.
pub struct PatchConfig<'a> {
    pub prefix: &'a str,
    pub glibc: &'a str,
    pub gcc_lib: &'a str,
    pub old_glibc: Option<&'a str>,
    pub old_gcc_lib: Option<&'a str>,
    pub store_dir: &'a str,
    pub loader_name: &'a str,
    pub patchelf: &'a Path,
    pub no_elf: bool,
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub summary: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Builds the patch context from command line values.
fn build_context(config: &PatchConfig<'_>) -> Result<PatchContext> {
    let mut builder = PatchContext::builder(config.prefix, config.glibc, config.gcc_lib)
        .store_dir(config.store_dir)
        .loader_name(config.loader_name);
    if let Some(old) = config.old_glibc {
        builder = builder.old_glibc(old);
    }
    if let Some(old) = config.old_gcc_lib {
        builder = builder.old_gcc_lib(old);
    }
    builder.build()
}

fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    match path {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(io::stdin().lock())),
    }
}

/// Creates a temporary file next to `path` so the final rename stays on one
/// filesystem.
fn staging_file(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tempfile::Builder::new()
        .prefix(".narpatch-")
        .suffix(".nar.tmp")
        .tempfile_in(dir)
}

fn run<T: ExecutableTool>(patcher: &Patcher<T>, config: &PatchConfig<'_>) -> Result<PatchReport> {
    let input = open_input(config.input)?;

    match config.output {
        Some(path) => {
            // The archive only replaces `path` once it has been written in full.
            let staging = staging_file(path)?;
            let report = {
                let writer = BufWriter::new(staging.as_file());
                patcher.process(input, writer)?
            };
            staging.persist(path).map_err(|e| e.error)?;
            log::debug!("wrote {}", path.display());
            Ok(report)
        }
        None => {
            let stdout = io::stdout();
            let writer = BufWriter::new(stdout.lock());
            patcher.process(input, writer)
        }
    }
}

fn print_summary(report: &PatchReport, format: OutputFormat) {
    let formatter = create_formatter(format);
    let text = formatter.format_report(report);
    let mut stderr = io::stderr().lock();
    let _ = stderr.write_all(text.as_bytes());
    if !text.ends_with('\n') {
        let _ = stderr.write_all(b"\n");
    }
}

/// Patch command implementation
pub fn patch(config: &PatchConfig<'_>) -> ExitCode {
    let ctx = match build_context(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return error_to_exit_code(&e);
        }
    };

    let tool: Box<dyn ExecutableTool> = if config.no_elf {
        log::info!("executable patching disabled");
        Box::new(NoTool)
    } else {
        let patchelf = Patchelf::new(config.patchelf);
        log::debug!("editing executables with {}", patchelf.program().display());
        Box::new(patchelf)
    };
    let patcher = Patcher::new(ctx, tool);
    log::info!(
        "relocating {} under {}",
        patcher.context().store_dir(),
        patcher.context().prefix()
    );

    let report = match run(&patcher, config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return error_to_exit_code(&e);
        }
    };

    if !report.is_clean() && !config.quiet {
        eprintln!(
            "Warning: {} executables left unpatched",
            report.elf_failures.len()
        );
    }
    if config.summary {
        print_summary(&report, config.format);
    }

    ExitCode::Success
}
