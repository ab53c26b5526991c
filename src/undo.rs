/// Undo functionality for reverting file organization runs.
///
/// The undo log is replayed last move first, putting every file back at its
/// recorded source path. A consumed log is archived under a timestamped name
/// rather than deleted.
use crate::clock::Clock;
use crate::error::UndoError;
use crate::events::{EventLevel, EventSink};
use crate::mover::move_file;
use crate::operation_log::{OperationLog, OperationRecord};
use std::fs;
use std::path::{Path, PathBuf};

/// A record that could not be reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back.
    pub restored: usize,
    /// Recorded destinations that no longer exist.
    pub skipped: Vec<PathBuf>,
    /// Records whose restore failed.
    pub failed: Vec<RestoreFailure>,
    /// Files found at an original location and renamed aside first.
    pub backups: Vec<PathBuf>,
    /// Where the consumed log went. `None` when failures kept it in place.
    pub archived_to: Option<PathBuf>,
}

impl UndoReport {
    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.skipped.len() + self.failed.len()
    }

    /// Returns true if every record was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Reverses a run recorded in an undo log.
pub struct UndoEngine<'a> {
    clock: &'a dyn Clock,
    sink: &'a dyn EventSink,
}

impl<'a> UndoEngine<'a> {
    pub fn new(clock: &'a dyn Clock, sink: &'a dyn EventSink) -> Self {
        Self { clock, sink }
    }

    /// Undoes every move recorded in the log at `log_path`.
    ///
    /// Records are replayed in reverse order. A record whose destination is
    /// gone is skipped with a warning. A file sitting at a record's original
    /// path is renamed to `<name>.bak.<timestamp>` before the restore.
    ///
    /// The log is archived once replay finishes, unless a record failed for
    /// another reason; then it stays so the undo can be retried. Records
    /// already restored are skipped on the retry since their destination is
    /// gone.
    ///
    /// # Errors
    ///
    /// [`UndoError::NoUndoLogFound`] or [`UndoError::CorruptUndoLog`] before
    /// anything is touched; [`UndoError::Archive`] if the log cannot be
    /// renamed after replay.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::clock::SystemClock;
    /// use dirsort::events::TracingSink;
    /// use dirsort::undo::UndoEngine;
    /// use std::path::Path;
    ///
    /// let engine = UndoEngine::new(&SystemClock, &TracingSink);
    /// match engine.undo(Path::new("/path/to/directory/.dirsort_undo.json")) {
    ///     Ok(report) => println!("Restored {} files", report.restored),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(&self, log_path: &Path) -> Result<UndoReport, UndoError> {
        let log = OperationLog::new(log_path);
        let records = log.load()?;

        self.sink.emit(
            EventLevel::Info,
            &format!("Undoing {} operations...", records.len()),
        );

        let mut report = UndoReport::default();
        for record in records.iter().rev() {
            self.restore(record, &mut report);
        }

        if report.failed.is_empty() {
            let archived = log.archive(self.clock)?;
            self.sink.emit(
                EventLevel::Info,
                &format!("Undo complete. Log backed up to: {}", archived.display()),
            );
            report.archived_to = Some(archived);
        } else {
            self.sink.emit(
                EventLevel::Warn,
                &format!(
                    "{} file(s) could not be restored; keeping {} for another attempt",
                    report.failed.len(),
                    log_path.display()
                ),
            );
        }

        Ok(report)
    }

    fn restore(&self, record: &OperationRecord, report: &mut UndoReport) {
        let current = &record.destination;
        let original = &record.source;

        if current.symlink_metadata().is_err() {
            self.sink.emit(
                EventLevel::Warn,
                &format!("Warning: Source not found: {}", current.display()),
            );
            report.skipped.push(current.clone());
            return;
        }

        if original.symlink_metadata().is_ok() {
            let backup = self.backup_path(original);
            if let Err(e) = fs::rename(original, &backup) {
                self.record_failure(
                    report,
                    original,
                    format!("Could not back up conflicting file: {}", e),
                );
                return;
            }
            self.sink.emit(
                EventLevel::Warn,
                &format!(
                    "{} was occupied; moved the existing file to {}",
                    original.display(),
                    backup.display()
                ),
            );
            report.backups.push(backup);
        }

        if let Some(parent) = original.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            self.record_failure(
                report,
                original,
                format!("Could not recreate {}: {}", parent.display(), e),
            );
            return;
        }

        if let Err(e) = move_file(current, original) {
            self.record_failure(report, current, format!("Failed to restore file: {}", e));
            return;
        }

        self.sink.emit(
            EventLevel::Info,
            &format!("Restored: {} -> {}", current.display(), original.display()),
        );
        report.restored += 1;
    }

    fn record_failure(&self, report: &mut UndoReport, path: &Path, reason: String) {
        self.sink.emit(
            EventLevel::Error,
            &format!("{}: {}", path.display(), reason),
        );
        report.failed.push(RestoreFailure {
            path: path.to_path_buf(),
            reason,
        });
    }

    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`.
    fn backup_path(&self, original: &Path) -> PathBuf {
        let timestamp = self.clock.now().format("%Y%m%d-%H%M%S");
        let filename = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let mut backup = original.with_file_name(format!("{}.bak.{}", filename, timestamp));
        let mut counter = 1;
        while backup.symlink_metadata().is_ok() {
            backup = original.with_file_name(format!(
                "{}.bak.{}.{}",
                filename, timestamp, counter
            ));
            counter += 1;
        }
        backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::events::MemorySink;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2025, 11, 9, 14, 30, 52).unwrap())
    }

    fn moved(base: &Path, name: &str, category: &str, content: &str) -> OperationRecord {
        let dir = base.join(category);
        fs::create_dir_all(&dir).expect("Failed to create category directory");
        fs::write(dir.join(name), content).expect("Failed to write file");
        OperationRecord {
            source: base.join(name),
            destination: dir.join(name),
            timestamp: "2025-11-09T14:30:52+00:00".to_string(),
        }
    }

    fn save(base: &Path, records: &[OperationRecord]) -> OperationLog {
        let log = OperationLog::for_directory(base);
        log.persist(records, &clock(), &MemorySink::new())
            .expect("Failed to save history");
        log
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = clock();
        let sink = MemorySink::new();
        let engine = UndoEngine::new(&clock, &sink);

        let result = engine.undo(&temp_dir.path().join(".dirsort_undo.json"));
        assert!(matches!(result, Err(UndoError::NoUndoLogFound { .. })));
    }

    #[test]
    fn test_undo_corrupt_history_touches_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join(".dirsort_undo.json");
        fs::write(&log_path, "definitely not json").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let result = UndoEngine::new(&clock, &sink).undo(&log_path);

        assert!(matches!(result, Err(UndoError::CorruptUndoLog { .. })));
        assert!(log_path.exists());
    }

    #[test]
    fn test_undo_multiple_files_and_archive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let records = vec![
            moved(base, "image.jpg", "images", "image data"),
            moved(base, "document.pdf", "documents", "pdf data"),
        ];
        let log = save(base, &records);

        let clock = clock();
        let sink = MemorySink::new();
        let report = UndoEngine::new(&clock, &sink)
            .undo(log.path())
            .expect("Undo failed");

        assert_eq!(report.restored, 2);
        assert!(report.is_complete_success());
        assert_eq!(
            fs::read_to_string(base.join("image.jpg")).unwrap(),
            "image data"
        );
        assert!(base.join("document.pdf").exists());
        assert!(!log.exists());
        assert_eq!(
            report.archived_to,
            Some(base.join(".dirsort_undo_20251109_143052.json"))
        );
    }

    #[test]
    fn test_undo_runs_in_reverse_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        // a.txt was moved to documents/, then a new a.txt appeared and was
        // moved under a suffixed name. Newest-first replay leaves the oldest
        // file at a.txt.
        let first = moved(base, "a.txt", "documents", "first");
        let second_dest = base.join("documents").join("a_20251109_143052_001.txt");
        fs::write(&second_dest, "second").unwrap();
        let second = OperationRecord {
            source: base.join("a.txt"),
            destination: second_dest,
            timestamp: first.timestamp.clone(),
        };
        let log = save(base, &[first, second]);

        let clock = clock();
        let sink = MemorySink::new();
        let report = UndoEngine::new(&clock, &sink).undo(log.path()).unwrap();

        assert_eq!(report.restored, 2);
        assert_eq!(fs::read_to_string(base.join("a.txt")).unwrap(), "first");
        assert_eq!(report.backups.len(), 1);
        assert_eq!(fs::read_to_string(&report.backups[0]).unwrap(), "second");
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let record = moved(base, "test.txt", "documents", "original content");
        let log = save(base, &[record]);

        // Simulates manual restoration of a different file
        fs::write(base.join("test.txt"), "new content").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let report = UndoEngine::new(&clock, &sink).undo(log.path()).unwrap();

        assert_eq!(report.restored, 1);
        assert!(report.failed.is_empty());
        assert_eq!(
            fs::read_to_string(base.join("test.txt")).unwrap(),
            "original content"
        );
        let backup = base.join("test.txt.bak.20251109-143052");
        assert_eq!(report.backups, vec![backup.clone()]);
        assert_eq!(fs::read_to_string(backup).unwrap(), "new content");
    }

    #[test]
    fn test_undo_with_missing_file_still_archives() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let present = moved(base, "here.txt", "documents", "here");
        let vanished = OperationRecord {
            source: base.join("gone.txt"),
            destination: base.join("documents").join("gone.txt"),
            timestamp: present.timestamp.clone(),
        };
        let log = save(base, &[present, vanished]);

        let clock = clock();
        let sink = MemorySink::new();
        let report = UndoEngine::new(&clock, &sink).undo(log.path()).unwrap();

        assert_eq!(report.restored, 1);
        assert_eq!(report.skipped, vec![base.join("documents").join("gone.txt")]);
        assert_eq!(report.total_processed(), 2);
        assert!(!report.is_complete_success());
        assert!(report.archived_to.is_some());
        assert!(!log.exists());
        assert!(
            sink.messages_at(EventLevel::Warn)
                .iter()
                .any(|m| m.contains("gone.txt"))
        );
    }

    #[test]
    fn test_undo_recreates_missing_parent_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir_all(base.join("images")).unwrap();
        fs::write(base.join("images").join("deep.jpg"), "deep").unwrap();
        let record = OperationRecord {
            source: base.join("trip").join("day1").join("deep.jpg"),
            destination: base.join("images").join("deep.jpg"),
            timestamp: "2025-11-09T14:30:52+00:00".to_string(),
        };
        let log = save(base, &[record]);

        let clock = clock();
        let sink = MemorySink::new();
        let report = UndoEngine::new(&clock, &sink).undo(log.path()).unwrap();

        assert_eq!(report.restored, 1);
        assert!(base.join("trip").join("day1").join("deep.jpg").exists());
    }
}
