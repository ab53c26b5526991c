//! Organizing a directory: enumerate, classify, move, record.

use crate::clock::Clock;
use crate::config::CompiledFilters;
use crate::error::{OrganizeError, PersistenceError};
use crate::events::{EventLevel, EventSink};
use crate::file_category::{CategoryTable, Classifier, FALLBACK_CATEGORY};
use crate::mover::{MoveOutcome, Mover, ReservedFiles, SkipReason};
use crate::operation_log::{OperationLog, OperationRecord};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Settings for one organize run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_directory: PathBuf,
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
    /// Leave files whose name starts with `.` in place.
    pub skip_hidden: bool,
    /// Descend into subdirectories, except ones named after a category.
    pub recursive: bool,
    /// Undo log location. Defaults to `.dirsort_undo.json` in the source directory.
    pub undo_log: Option<PathBuf>,
    /// Extra file names that must never be moved (e.g. our own log file).
    pub reserved_names: Vec<String>,
}

impl RunConfig {
    pub fn new(source_directory: impl Into<PathBuf>) -> Self {
        Self {
            source_directory: source_directory.into(),
            dry_run: false,
            skip_hidden: true,
            recursive: false,
            undo_log: None,
            reserved_names: Vec::new(),
        }
    }
}

/// Counters for a run. Used for reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Files looked at.
    pub processed: usize,
    /// Files actually moved.
    pub moved: usize,
    /// Files left in place by a skip rule.
    pub skipped: usize,
    /// Files that failed; the run went on without them.
    pub errors: usize,
    /// Files given a suffixed name because theirs was taken.
    pub conflicts_resolved: usize,
    /// Files a dry run would have moved.
    pub simulated: usize,
}

/// A move a dry run would have made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: String,
}

/// Everything a caller needs to report on a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub dry_run: bool,
    pub statistics: RunStatistics,
    /// Moved (or, in a dry run, would-move) count per category, in table
    /// order with the fallback last. Categories with no files are left out.
    pub categories: Vec<(String, usize)>,
    /// Dry-run plan, in processing order. Empty for live runs.
    pub planned: Vec<PlannedMove>,
    /// Where the undo log was written, if it was.
    pub undo_log: Option<PathBuf>,
    /// Set when moves happened but the undo log could not be saved.
    pub persistence_error: Option<PersistenceError>,
}

/// Drives classification and relocation over a source directory.
pub struct Organizer<'a> {
    table: CategoryTable,
    filters: CompiledFilters,
    clock: &'a dyn Clock,
    sink: &'a dyn EventSink,
}

impl<'a> Organizer<'a> {
    pub fn new(table: CategoryTable, clock: &'a dyn Clock, sink: &'a dyn EventSink) -> Self {
        Self {
            table,
            filters: CompiledFilters::default(),
            clock,
            sink,
        }
    }

    /// Applies exclude/include filters on top of the built-in skip rules.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// Organizes `source_dir` for real, skipping hidden files, and returns
    /// the counters.
    pub fn organize(
        &self,
        source_dir: &Path,
        recursive: bool,
    ) -> Result<RunStatistics, OrganizeError> {
        let mut config = RunConfig::new(source_dir);
        config.recursive = recursive;
        self.run(&config).map(|report| report.statistics)
    }

    /// Runs one organize pass.
    ///
    /// # Errors
    ///
    /// Only precondition failures are errors: a missing, non-directory or
    /// unreadable source. Per-file failures are counted in
    /// [`RunStatistics::errors`], and an undo log that cannot be written is
    /// returned in [`RunReport::persistence_error`].
    pub fn run(&self, config: &RunConfig) -> Result<RunReport, OrganizeError> {
        let source = validate_source(&config.source_directory)?;

        let undo_log = config
            .undo_log
            .as_ref()
            .map(OperationLog::new)
            .unwrap_or_else(|| OperationLog::for_directory(&source));
        let reserved = config
            .reserved_names
            .iter()
            .fold(ReservedFiles::new(undo_log.clone()), |reserved, name| {
                reserved.with_name(name.clone())
            });

        let mode = if config.dry_run { "DRY RUN" } else { "LIVE" };
        self.sink.emit(
            EventLevel::Info,
            &format!("Starting organization of: {} ({})", source.display(), mode),
        );

        let candidates = self.collect_candidates(&source, config)?;
        if candidates.is_empty() {
            self.sink.emit(EventLevel::Info, "No files to organize.");
        }

        let classifier = Classifier::new(&self.table);
        let mover = Mover::new(
            self.clock,
            self.sink,
            &reserved,
            config.dry_run,
            config.skip_hidden,
        );

        let mut statistics = RunStatistics::default();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut planned = Vec::new();
        let mut records: Vec<OperationRecord> = Vec::new();

        let total = candidates.len();
        for (index, file_path) in candidates.iter().enumerate() {
            statistics.processed += 1;

            let relative = file_path.strip_prefix(&source).unwrap_or(file_path);
            let category = classifier.classify(file_path);
            let outcome = if self.filters.is_excluded(relative) {
                self.sink.emit(
                    EventLevel::Debug,
                    &format!("Skipping filtered file: {}", relative.display()),
                );
                MoveOutcome::Skipped(SkipReason::Filtered)
            } else {
                mover.relocate(file_path, &source.join(category))
            };

            match outcome {
                MoveOutcome::Moved {
                    record,
                    conflict_resolved,
                } => {
                    statistics.moved += 1;
                    statistics.conflicts_resolved += usize::from(conflict_resolved);
                    *counts.entry(category).or_insert(0) += 1;
                    records.push(record);
                }
                MoveOutcome::Simulated {
                    source,
                    destination,
                    conflict_resolved,
                } => {
                    statistics.simulated += 1;
                    statistics.conflicts_resolved += usize::from(conflict_resolved);
                    *counts.entry(category).or_insert(0) += 1;
                    planned.push(PlannedMove {
                        source,
                        destination,
                        category: category.to_string(),
                    });
                }
                MoveOutcome::Skipped(_) => statistics.skipped += 1,
                MoveOutcome::Failed(_) => statistics.errors += 1,
            }

            self.sink.progress(index + 1, total);
        }

        let mut report = RunReport {
            dry_run: config.dry_run,
            statistics,
            categories: self.ordered_counts(&counts),
            planned,
            undo_log: None,
            persistence_error: None,
        };

        if !config.dry_run && !records.is_empty() {
            match undo_log.persist(&records, self.clock, self.sink) {
                Ok(()) => report.undo_log = Some(undo_log.path().to_path_buf()),
                Err(e) => {
                    self.sink.emit(
                        EventLevel::Warn,
                        &format!("{}. The moves stand but cannot be undone automatically.", e),
                    );
                    report.persistence_error = Some(e);
                }
            }
        }

        self.sink.emit(
            EventLevel::Info,
            &format!(
                "Finished ({}): processed {}, moved {}, skipped {}, errors {}, conflicts resolved {}",
                mode,
                statistics.processed,
                statistics.moved,
                statistics.skipped,
                statistics.errors,
                statistics.conflicts_resolved
            ),
        );

        Ok(report)
    }

    fn ordered_counts(&self, counts: &HashMap<&str, usize>) -> Vec<(String, usize)> {
        self.table
            .iter()
            .map(|category| category.name())
            .chain(
                self.table
                    .get(FALLBACK_CATEGORY)
                    .is_none()
                    .then_some(FALLBACK_CATEGORY),
            )
            .filter_map(|name| counts.get(name).map(|count| (name.to_string(), *count)))
            .collect()
    }

    /// Lists the files to process, sorted by path.
    ///
    /// A symlink counts as a file when its target is one; the link itself is
    /// what gets moved. Links to directories are never followed.
    ///
    /// Recursive runs do not descend into directories named after a
    /// category (or the fallback), so files a previous run already sorted
    /// stay put. With `skip_hidden`, hidden directories are not entered either.
    fn collect_candidates(
        &self,
        source: &Path,
        config: &RunConfig,
    ) -> Result<Vec<PathBuf>, OrganizeError> {
        let entries = fs::read_dir(source).map_err(|e| OrganizeError::Unreadable {
            path: source.to_path_buf(),
            source: e,
        })?;

        if !config.recursive {
            let mut files: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .collect();
            files.sort();
            return Ok(files);
        }

        let walker = WalkDir::new(source)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !(self.table.is_category_dir(&name)
                    || (config.skip_hidden && name.starts_with('.')))
            });

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry)
                    if entry.file_type().is_file()
                        || (entry.path_is_symlink() && entry.path().is_file()) =>
                {
                    files.push(entry.into_path())
                }
                Ok(_) => {}
                Err(e) => self
                    .sink
                    .emit(EventLevel::Warn, &format!("Skipping unreadable entry: {}", e)),
            }
        }
        Ok(files)
    }
}

fn validate_source(source: &Path) -> Result<PathBuf, OrganizeError> {
    if !source.exists() {
        return Err(OrganizeError::SourceNotFound {
            path: source.to_path_buf(),
        });
    }
    if !source.is_dir() {
        return Err(OrganizeError::SourceNotDirectory {
            path: source.to_path_buf(),
        });
    }
    std::path::absolute(source).map_err(|e| OrganizeError::Unreadable {
        path: source.to_path_buf(),
        source: e,
    })
}
