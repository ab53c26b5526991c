/// Relocation of single files into category directories.
///
/// [`Mover::relocate`] applies the skip policies, picks a free destination,
/// and either moves the file or, in dry-run mode, only reports where it
/// would go. Every outcome, failures included, comes back as a
/// [`MoveOutcome`] value so the caller can count it and keep going.
use crate::clock::Clock;
use crate::error::FileError;
use crate::events::{EventLevel, EventSink};
use crate::operation_log::{OperationLog, OperationRecord};
use crate::path_resolver::PathResolver;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Why a file was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Hidden file while hidden files are skipped.
    Hidden,
    /// One of the organizer's own bookkeeping files.
    Reserved,
    /// Matched a configured exclude filter.
    Filtered,
}

/// Result of handling one file.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The file was moved.
    Moved {
        record: OperationRecord,
        conflict_resolved: bool,
    },
    /// Dry run: the file would have been moved to `destination`.
    Simulated {
        source: PathBuf,
        destination: PathBuf,
        conflict_resolved: bool,
    },
    Skipped(SkipReason),
    Failed(FileError),
}

/// File names the organizer must never move: its undo log (with temp file
/// and archives) and any log files it writes.
#[derive(Debug, Clone)]
pub struct ReservedFiles {
    undo_log: OperationLog,
    names: HashSet<String>,
}

impl ReservedFiles {
    pub fn new(undo_log: OperationLog) -> Self {
        Self {
            undo_log,
            names: HashSet::new(),
        }
    }

    /// Reserves an additional exact file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn is_reserved(&self, file_name: &str) -> bool {
        self.names.contains(file_name) || self.undo_log.is_reserved_name(file_name)
    }
}

/// Moves (or simulates moving) files one at a time.
pub struct Mover<'a> {
    resolver: PathResolver<'a>,
    clock: &'a dyn Clock,
    sink: &'a dyn EventSink,
    reserved: &'a ReservedFiles,
    dry_run: bool,
    skip_hidden: bool,
    /// Destinations handed out so far, so a dry run sees its own plan.
    claimed: RefCell<HashSet<PathBuf>>,
}

impl<'a> Mover<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        sink: &'a dyn EventSink,
        reserved: &'a ReservedFiles,
        dry_run: bool,
        skip_hidden: bool,
    ) -> Self {
        Self {
            resolver: PathResolver::new(clock),
            clock,
            sink,
            reserved,
            dry_run,
            skip_hidden,
            claimed: RefCell::new(HashSet::new()),
        }
    }

    /// Moves `file_path` into `destination_dir`.
    ///
    /// The destination directory is created (with parents) only right
    /// before a real move, never in dry-run mode.
    pub fn relocate(&self, file_path: &Path, destination_dir: &Path) -> MoveOutcome {
        let Some(file_name) = file_path.file_name().map(|n| n.to_string_lossy()) else {
            let error = FileError::InvalidFileName {
                path: file_path.to_path_buf(),
            };
            self.sink.emit(EventLevel::Error, &error.to_string());
            return MoveOutcome::Failed(error);
        };

        if self.reserved.is_reserved(&file_name) {
            self.sink.emit(
                EventLevel::Debug,
                &format!("Skipping reserved file: {}", file_name),
            );
            return MoveOutcome::Skipped(SkipReason::Reserved);
        }

        if self.skip_hidden && file_name.starts_with('.') {
            self.sink.emit(
                EventLevel::Debug,
                &format!("Skipping hidden file: {}", file_name),
            );
            return MoveOutcome::Skipped(SkipReason::Hidden);
        }

        // The undo log stores paths as JSON strings.
        if file_path.to_str().is_none() || destination_dir.to_str().is_none() {
            return self.fail(FileError::InvalidFileName {
                path: file_path.to_path_buf(),
            });
        }

        let resolved = self
            .resolver
            .resolve(destination_dir, file_path, &self.claimed.borrow());
        let resolution = match resolved {
            Ok(resolution) => resolution,
            Err(error) => return self.fail(error),
        };
        self.claimed.borrow_mut().insert(resolution.path.clone());

        if self.dry_run {
            self.sink.emit(
                EventLevel::Info,
                &format!(
                    "[DRY RUN] Would move: {} -> {}",
                    file_path.display(),
                    resolution.path.display()
                ),
            );
            return MoveOutcome::Simulated {
                source: file_path.to_path_buf(),
                destination: resolution.path,
                conflict_resolved: resolution.renamed,
            };
        }

        if let Err(e) = fs::create_dir_all(destination_dir) {
            return self.fail(FileError::from_io(destination_dir, e));
        }

        if let Err(e) = move_file(file_path, &resolution.path) {
            return self.fail(FileError::from_io(file_path, e));
        }

        self.sink.emit(
            EventLevel::Info,
            &format!(
                "Moved: {} -> {}",
                file_path.display(),
                resolution.path.display()
            ),
        );

        MoveOutcome::Moved {
            record: OperationRecord {
                source: file_path.to_path_buf(),
                destination: resolution.path,
                timestamp: self.clock.now().to_rfc3339(),
            },
            conflict_resolved: resolution.renamed,
        }
    }

    fn fail(&self, error: FileError) -> MoveOutcome {
        self.sink.emit(EventLevel::Error, &error.to_string());
        MoveOutcome::Failed(error)
    }
}

/// Renames `from` to `to`, falling back to copy and delete when the two
/// live on different filesystems.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        result => result,
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
        FixedClock(Local.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap())
    }

    fn reserved(base: &Path) -> ReservedFiles {
        ReservedFiles::new(OperationLog::for_directory(base)).with_name("dirsort.log")
    }

    #[test]
    fn test_relocate_creates_directory_and_records() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let file_path = base.join("test.txt");
        fs::write(&file_path, "test content").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, true);

        let (record, conflict_resolved) = match mover.relocate(&file_path, &base.join("documents")) {
            MoveOutcome::Moved {
                record,
                conflict_resolved,
            } => (record, conflict_resolved),
            other => panic!("expected a move, got {:?}", other),
        };

        assert!(!conflict_resolved);
        assert_eq!(record.source, file_path);
        assert_eq!(record.destination, base.join("documents").join("test.txt"));
        assert_eq!(record.timestamp, clock.0.to_rfc3339());
        assert!(!file_path.exists());
        assert_eq!(fs::read_to_string(&record.destination).unwrap(), "test content");
    }

    #[test]
    fn test_relocate_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir(base.join("documents")).unwrap();
        fs::write(base.join("documents").join("notes.txt"), "old").unwrap();
        fs::write(base.join("notes.txt"), "new").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, true);

        let outcome = mover.relocate(&base.join("notes.txt"), &base.join("documents"));
        assert!(matches!(
            outcome,
            MoveOutcome::Moved {
                conflict_resolved: true,
                ..
            }
        ));

        let docs = base.join("documents");
        assert_eq!(fs::read_to_string(docs.join("notes.txt")).unwrap(), "old");
        assert_eq!(
            fs::read_to_string(docs.join("notes_20240202_100000_001.txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let file_path = base.join("song.mp3");
        fs::write(&file_path, "la").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, true, true);

        let outcome = mover.relocate(&file_path, &base.join("audio"));
        match outcome {
            MoveOutcome::Simulated { destination, .. } => {
                assert_eq!(destination, base.join("audio").join("song.mp3"));
            }
            other => panic!("expected a simulated move, got {:?}", other),
        }
        assert!(file_path.exists());
        assert!(!base.join("audio").exists());
        assert!(sink.messages_at(EventLevel::Info)[0].starts_with("[DRY RUN]"));
    }

    #[test]
    fn test_hidden_files_follow_policy() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let hidden = base.join(".env");
        fs::write(&hidden, "SECRET=1").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);

        let skipping = Mover::new(&clock, &sink, &reserved, false, true);
        assert!(matches!(
            skipping.relocate(&hidden, &base.join("other")),
            MoveOutcome::Skipped(SkipReason::Hidden)
        ));
        assert!(hidden.exists());

        let including = Mover::new(&clock, &sink, &reserved, false, false);
        assert!(matches!(
            including.relocate(&hidden, &base.join("other")),
            MoveOutcome::Moved { .. }
        ));
        assert!(base.join("other").join(".env").exists());
    }

    #[test]
    fn test_reserved_files_always_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let undo_log = base.join(".dirsort_undo.json");
        let run_log = base.join("dirsort.log");
        fs::write(&undo_log, "[]").unwrap();
        fs::write(&run_log, "").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, false);

        for path in [&undo_log, &run_log] {
            assert!(matches!(
                mover.relocate(path, &base.join("other")),
                MoveOutcome::Skipped(SkipReason::Reserved)
            ));
            assert!(path.exists());
        }
    }

    #[test]
    fn test_missing_source_is_a_file_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, true);

        let outcome = mover.relocate(&base.join("ghost.txt"), &base.join("documents"));
        assert!(matches!(outcome, MoveOutcome::Failed(FileError::Io { .. })));
        assert_eq!(sink.messages_at(EventLevel::Error).len(), 1);
    }

    #[test]
    fn test_dry_run_does_not_hand_out_the_same_name_twice() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir_all(base.join("a")).unwrap();
        fs::create_dir_all(base.join("b")).unwrap();
        fs::write(base.join("a").join("report.pdf"), "a").unwrap();
        fs::write(base.join("b").join("report.pdf"), "b").unwrap();

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, true, true);
        let docs = base.join("documents");

        let destinations: Vec<_> = ["a", "b"]
            .iter()
            .map(|dir| match mover.relocate(&base.join(dir).join("report.pdf"), &docs) {
                MoveOutcome::Simulated {
                    destination,
                    conflict_resolved,
                    ..
                } => (destination, conflict_resolved),
                other => panic!("expected a simulated move, got {:?}", other),
            })
            .collect();

        assert_eq!(
            destinations,
            vec![
                (docs.join("report.pdf"), false),
                (docs.join("report_20240202_100000_001.pdf"), true),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_rejected_before_moving() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let file_path = base.join(OsStr::from_bytes(b"bad\xff.pdf"));
        // Some filesystems refuse such names outright.
        if fs::write(&file_path, "x").is_err() {
            return;
        }

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, true);

        let outcome = mover.relocate(&file_path, &base.join("documents"));
        assert!(matches!(
            outcome,
            MoveOutcome::Failed(FileError::InvalidFileName { .. })
        ));
        assert!(file_path.exists());
        assert!(!base.join("documents").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_reported_not_raised() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let locked = base.join("locked");
        fs::create_dir(&locked).unwrap();
        let file_path = locked.join("a.txt");
        fs::write(&file_path, "a").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores directory permissions.
        if fs::write(locked.join("probe"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let clock = clock();
        let sink = MemorySink::new();
        let reserved = reserved(base);
        let mover = Mover::new(&clock, &sink, &reserved, false, true);

        let outcome = mover.relocate(&file_path, &base.join("documents"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(
            outcome,
            MoveOutcome::Failed(FileError::PermissionDenied { .. })
        ));
        assert!(file_path.exists());
    }
}
