//! Command-line interface for dirsort.
//!
//! Parses arguments, loads configuration, calls into the library and turns
//! the resulting reports into terminal output and an exit code.

use crate::config::{LOCAL_CONFIG_FILE, OrganizerConfig};
use crate::error::UndoError;
use crate::events::TracingSink;
use crate::operation_log::UNDO_LOG_FILE;
use crate::organizer::RunConfig;
use crate::output::{OutputFormatter, ProgressSink};
use clap::Parser;
use std::path::{Path, PathBuf};

const EXAMPLES: &str = "\
Examples:
  dirsort ~/Downloads
  dirsort ~/Downloads --dry-run
  dirsort ~/Downloads --recursive
  dirsort ~/Downloads --undo
  dirsort --create-config";

/// Organize files by type into categorized folders.
#[derive(Debug, Parser)]
#[command(name = "dirsort", version, about, after_help = EXAMPLES)]
pub struct Cli {
    /// Directory to organize (optional with --undo or --create-config)
    pub source_directory: Option<PathBuf>,

    /// Simulate operations without moving files
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Organize files in subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Include hidden files (starting with .)
    #[arg(long)]
    pub include_hidden: bool,

    /// Undo the last organization
    #[arg(short, long)]
    pub undo: bool,

    /// Undo log location (default: <SOURCE>/.dirsort_undo.json)
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Create a sample configuration file and exit
    #[arg(long)]
    pub create_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also append log output to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files in a directory.
    Organize {
        source: PathBuf,
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Undo the organization recorded in `log`.
    Undo { log: PathBuf },
    /// Write a sample configuration to `path`.
    CreateConfig { path: PathBuf },
}

impl Cli {
    /// Works out which command the arguments ask for.
    pub fn command(&self) -> Result<OrganizeCommand, String> {
        if self.create_config {
            let path = self
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            return Ok(OrganizeCommand::CreateConfig { path });
        }

        if self.undo {
            let log = match (&self.log, &self.source_directory) {
                (Some(log), _) => log.clone(),
                (None, Some(source)) => source.join(UNDO_LOG_FILE),
                (None, None) => PathBuf::from(UNDO_LOG_FILE),
            };
            return Ok(OrganizeCommand::Undo { log });
        }

        match &self.source_directory {
            Some(source) => Ok(OrganizeCommand::Organize {
                source: source.clone(),
                dry_run: self.dry_run,
            }),
            None => Err(
                "source_directory is required (unless using --undo or --create-config)"
                    .to_string(),
            ),
        }
    }

    /// File names that must never be organized, beyond the undo log.
    fn reserved_names(&self) -> Vec<String> {
        self.log_file
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| vec![name.to_string_lossy().into_owned()])
            .unwrap_or_default()
    }
}

/// Runs the parsed command line and returns the process exit code.
pub fn run_cli(cli: &Cli) -> i32 {
    let command = match cli.command() {
        Ok(command) => command,
        Err(message) => {
            OutputFormatter::error(&message);
            return 2;
        }
    };

    match command {
        OrganizeCommand::CreateConfig { path } => create_config(&path),
        OrganizeCommand::Undo { log } => undo_organization(&log),
        OrganizeCommand::Organize { source, dry_run } => organize(cli, &source, dry_run),
    }
}

fn create_config(path: &Path) -> i32 {
    match OrganizerConfig::write_sample(path) {
        Ok(()) => {
            OutputFormatter::success(&format!("Sample config created at: {}", path.display()));
            0
        }
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            1
        }
    }
}

fn organize(cli: &Cli, source: &Path, dry_run: bool) -> i32 {
    let sink = ProgressSink::new();

    let config = match OrganizerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&format!("Configuration Error: {}", e));
            return 1;
        }
    };
    let prepared = config
        .category_table(&sink)
        .and_then(|table| Ok((table, config.compile_filters()?)));
    let (table, filters) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            OutputFormatter::error(&format!("Configuration Error: {}", e));
            return 1;
        }
    };

    let run_config = RunConfig {
        source_directory: source.to_path_buf(),
        dry_run,
        skip_hidden: config.options.skip_hidden && !cli.include_hidden,
        recursive: config.options.recursive || cli.recursive,
        undo_log: cli.log.clone(),
        reserved_names: cli.reserved_names(),
    };

    if dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing: {}", source.display()));
    } else {
        OutputFormatter::info(&format!("Organizing: {}", source.display()));
    }

    let result = crate::run(&run_config, table, filters, &sink);
    sink.finish();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            return e.exit_code();
        }
    };

    OutputFormatter::run_summary(&report);

    if let Some(e) = &report.persistence_error {
        OutputFormatter::warning(&format!(
            "{}. Files were moved but this run cannot be undone automatically.",
            e
        ));
    } else if let Some(log) = &report.undo_log {
        OutputFormatter::success(&format!(
            "Undo log saved. Use 'dirsort --undo --log {}' to revert changes.",
            log.display()
        ));
    } else if dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    }

    if report.statistics.errors > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }

    0
}

fn undo_organization(log: &Path) -> i32 {
    OutputFormatter::info("Undoing previous organization...");

    match crate::undo(log, &TracingSink) {
        Ok(report) => {
            OutputFormatter::undo_summary(&report);
            if report.failed.is_empty() { 0 } else { 1 }
        }
        Err(e @ UndoError::NoUndoLogFound { .. }) => {
            OutputFormatter::error(&e.to_string());
            e.exit_code()
        }
        Err(e) => {
            OutputFormatter::error(&format!("Undo failed: {}", e));
            e.exit_code()
        }
    }
}
