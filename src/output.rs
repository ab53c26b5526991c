//! Terminal output for the `dirsort` binary.
//!
//! The library reports through [`EventSink`]; this module turns finished
//! reports into colored summaries and drives the progress bar.

use crate::events::{EventLevel, EventSink, TracingSink};
use crate::organizer::RunReport;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::OnceLock;

/// Colored message helpers.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the end-of-run summary.
    pub fn run_summary(report: &RunReport) {
        let stats = &report.statistics;
        let mode = if report.dry_run { "DRY RUN" } else { "LIVE" };
        let rule = "=".repeat(50);

        println!("\n{}", rule);
        println!(" {}", format!("Operation Summary ({})", mode).bold());
        println!("{}", rule);
        println!("Files processed: {}", stats.processed);
        if report.dry_run {
            println!("Would move:      {}", stats.simulated.to_string().yellow());
        } else {
            println!("Files moved:     {}", stats.moved.to_string().green());
        }
        println!("Files skipped:   {}", stats.skipped);
        let errors = if stats.errors > 0 {
            stats.errors.to_string().red()
        } else {
            stats.errors.to_string().normal()
        };
        println!("Errors:          {}", errors);
        if stats.conflicts_resolved > 0 {
            println!("Conflicts resolved: {}", stats.conflicts_resolved);
        }
        println!("{}", rule);

        if !report.categories.is_empty() {
            let total = if report.dry_run {
                stats.simulated
            } else {
                stats.moved
            };
            Self::summary_table(&report.categories, total);
        }

        for planned in &report.planned {
            Self::dry_run_notice(&format!(
                "{} -> {}",
                planned.source.display(),
                planned.destination.display()
            ));
        }
    }

    /// Prints a per-category table.
    pub fn summary_table(category_counts: &[(String, usize)], total_files: usize) {
        Self::header("BY CATEGORY");

        let width = category_counts
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    /// Prints the outcome of an undo.
    pub fn undo_summary(report: &UndoReport) {
        Self::success(&format!("Restored: {}", report.restored));

        if !report.skipped.is_empty() {
            Self::warning(&format!(
                "Skipped: {} (no longer at recorded location)",
                report.skipped.len()
            ));
            for path in &report.skipped {
                println!("    - {}", path.display());
            }
        }

        for backup in &report.backups {
            Self::warning(&format!("Existing file kept as {}", backup.display()));
        }

        if !report.failed.is_empty() {
            Self::error(&format!("Failed: {}", report.failed.len()));
            for failure in &report.failed {
                eprintln!("    - {}: {}", failure.path.display(), failure.reason);
            }
            Self::error("The undo log was kept. Fix the issues above and run --undo again.");
        }

        if let Some(archived) = &report.archived_to {
            Self::info(&format!("Undo log backed up to: {}", archived.display()));
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Event sink for interactive runs: logs through `tracing` and advances a
/// progress bar created on the first progress report.
#[derive(Default)]
pub struct ProgressSink {
    bar: OnceLock<ProgressBar>,
    inner: TracingSink,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the progress bar from the terminal.
    pub fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, level: EventLevel, message: &str) {
        match self.bar.get() {
            Some(bar) => bar.suspend(|| self.inner.emit(level, message)),
            None => self.inner.emit(level, message),
        }
    }

    fn progress(&self, done: usize, total: usize) {
        let bar = self
            .bar
            .get_or_init(|| OutputFormatter::create_progress_bar(total as u64));
        bar.set_position(done as u64);
    }
}
