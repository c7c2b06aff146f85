//! Summary formatting for the CLI.

use narpatch::PatchReport;
use serde_json::json;

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats the report of a finished patch run
    fn format_report(&self, report: &PatchReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_report(&self, report: &PatchReport) -> String {
        let mut output = String::new();

        output.push_str("Patch Summary:\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!(
            "  Nodes:          {} ({} files, {} symlinks, {} directories)\n",
            report.total_nodes(),
            report.regular_files,
            report.symlinks,
            report.directories
        ));
        output.push_str(&format!(
            "  Symlinks:       {} rewritten\n",
            report.symlinks_rewritten
        ));
        output.push_str(&format!(
            "  Scripts:        {} rewritten\n",
            report.scripts_rewritten
        ));
        output.push_str(&format!(
            "  Executables:    {} ELF, {} patched, {} static\n",
            report.elf_files, report.elf_patched, report.elf_static
        ));
        output.push_str(&format!(
            "  Size:           {} in, {} out\n",
            humanize_bytes(report.bytes_read),
            humanize_bytes(report.bytes_written)
        ));

        if !report.is_clean() {
            output.push_str(&format!(
                "\n{} executables left unpatched:\n",
                report.elf_failures.len()
            ));
            for path in &report.elf_failures {
                output.push_str(&format!("  {}\n", path));
            }
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &PatchReport) -> String {
        let obj = json!({
            "status": if report.is_clean() { "ok" } else { "partial" },
            "total_nodes": report.total_nodes(),
            "files_changed": report.files_changed(),
            "report": report,
        });
        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
