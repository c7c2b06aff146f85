//! CLI tool for relocating Nix archives under an alternate prefix.

mod commands;
mod exit_codes;
mod output;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// Rewrite a Nix archive so its store paths live under a new prefix
///
/// Reads a NAR from standard input (or --input) and writes the patched NAR to
/// standard output (or --output). Symlink targets, script interpreter lines
/// and the interpreter and RPATH of dynamically linked executables are moved
/// under the prefix.
#[derive(Parser)]
#[command(name = "narpatch")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Installation prefix to move store paths under (e.g. /data/x)
    #[arg(long)]
    prefix: String,

    /// Store path of the glibc to link executables against
    #[arg(long)]
    glibc: String,

    /// Store path of the gcc runtime library package
    #[arg(long)]
    gcc_lib: String,

    /// Store path of the glibc to replace in RPATH entries
    #[arg(long)]
    old_glibc: Option<String>,

    /// Store path of the gcc runtime library to replace in RPATH entries
    #[arg(long)]
    old_gcc_lib: Option<String>,

    /// Root directory of the store
    #[arg(long, default_value = narpatch::patch::DEFAULT_STORE_DIR)]
    store_dir: String,

    /// File name of the dynamic loader inside glibc's lib directory
    #[arg(long, default_value = narpatch::patch::DEFAULT_LOADER_NAME)]
    loader_name: String,

    /// patchelf program used to edit executables
    #[arg(long, env = "PATCHELF", default_value = "patchelf")]
    patchelf: PathBuf,

    /// Do not edit executables; only symlinks and scripts are rewritten
    #[arg(long)]
    no_elf: bool,

    /// Read the archive from this file instead of standard input
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Write the archive to this file instead of standard output
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Print a summary of the run to standard error
    #[arg(long, short = 's')]
    summary: bool,

    /// Summary format
    #[arg(long, short = 'f', value_enum, default_value = "human")]
    format: OutputFormat,

    /// Log more detail (repeat for more)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress warnings and log output
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Maps -q/-v flags to a log level; RUST_LOG still takes precedence.
fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Off;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                exit_codes::BAD_ARGS
            } else {
                exit_codes::SUCCESS
            };
            std::process::exit(code);
        }
    };

    // The archive goes to stdout, so logs must stay on stderr.
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose, cli.quiet))
        .target(env_logger::Target::Stderr)
        .parse_default_env()
        .init();

    let exit_code = commands::patch(&commands::PatchConfig {
        prefix: &cli.prefix,
        glibc: &cli.glibc,
        gcc_lib: &cli.gcc_lib,
        old_glibc: cli.old_glibc.as_deref(),
        old_gcc_lib: cli.old_gcc_lib.as_deref(),
        store_dir: &cli.store_dir,
        loader_name: &cli.loader_name,
        patchelf: &cli.patchelf,
        no_elf: cli.no_elf,
        input: cli.input.as_deref(),
        output: cli.output.as_deref(),
        summary: cli.summary,
        format: cli.format,
        quiet: cli.quiet,
    });

    std::process::exit(exit_code.code());
}
