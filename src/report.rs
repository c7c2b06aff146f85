//! Summary of a patch run.

/// Counters collected while patching one archive.
///
/// Returned by [`Patcher::process`](crate::Patcher::process).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PatchReport {
    /// Regular files seen, executable or not.
    pub regular_files: u64,
    /// Regular files carrying the executable marker.
    pub executables: u64,
    /// Symbolic links seen.
    pub symlinks: u64,
    /// Directories seen, including the root if it is one.
    pub directories: u64,
    /// Symlink targets moved under the prefix.
    pub symlinks_rewritten: u64,
    /// Scripts whose `#!` line was rewritten.
    pub scripts_rewritten: u64,
    /// Regular files starting with the ELF magic number.
    pub elf_files: u64,
    /// ELF files skipped because they did not look dynamically linked.
    pub elf_static: u64,
    /// ELF files the tool edited.
    pub elf_patched: u64,
    /// Paths of ELF files the tool failed to edit; emitted unchanged.
    pub elf_failures: Vec<String>,
    /// Bytes consumed from the input.
    pub bytes_read: u64,
    /// Bytes written to the output.
    pub bytes_written: u64,
}

impl PatchReport {
    /// Total number of nodes in the archive.
    pub fn total_nodes(&self) -> u64 {
        self.regular_files + self.symlinks + self.directories
    }

    /// Number of files whose bytes differ from the input.
    pub fn files_changed(&self) -> u64 {
        self.symlinks_rewritten + self.scripts_rewritten + self.elf_patched
    }

    /// Returns `true` if every file that needed patching was patched.
    pub fn is_clean(&self) -> bool {
        self.elf_failures.is_empty()
    }
}
