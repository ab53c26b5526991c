/// Persistent record of the moves made by a run.
///
/// The undo log is a JSON array of `{source, destination, timestamp}`
/// objects in the order the moves happened. It is always written whole,
/// through a temporary file renamed over the target, so a reader never sees
/// half a log.
use crate::clock::{Clock, file_token};
use crate::error::{PersistenceError, UndoError};
use crate::events::{EventLevel, EventSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default undo log file name, placed in the organized directory.
pub const UNDO_LOG_FILE: &str = ".dirsort_undo.json";

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Where the file was before the move.
    pub source: PathBuf,
    /// Where the file is now.
    pub destination: PathBuf,
    /// RFC 3339 time of the move.
    pub timestamp: String,
}

/// Handle to an undo log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log used for `source_dir` when no explicit path is given.
    pub fn for_directory(source_dir: &Path) -> Self {
        Self::new(source_dir.join(UNDO_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the records back in their original order.
    ///
    /// # Errors
    ///
    /// [`UndoError::NoUndoLogFound`] if there is no log,
    /// [`UndoError::CorruptUndoLog`] if it does not parse.
    pub fn load(&self) -> Result<Vec<OperationRecord>, UndoError> {
        let content = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                UndoError::NoUndoLogFound {
                    path: self.path.clone(),
                }
            } else {
                UndoError::Read {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| UndoError::CorruptUndoLog {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Saves `records` as the undo log.
    ///
    /// An unconsumed log already at this path is kept: the new records are
    /// appended after its records. A log that no longer parses is moved
    /// aside under a `corrupt` name instead of being overwritten.
    pub fn persist(
        &self,
        records: &[OperationRecord],
        clock: &dyn Clock,
        sink: &dyn EventSink,
    ) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut combined = Vec::new();
        if self.exists() {
            match self.load() {
                Ok(previous) => {
                    sink.emit(
                        EventLevel::Info,
                        &format!(
                            "Undo log {} has {} unconsumed record(s); appending",
                            self.path.display(),
                            previous.len()
                        ),
                    );
                    combined = previous;
                }
                Err(e) => {
                    let aside = self.archive_target(clock, "corrupt_");
                    fs::rename(&self.path, &aside).map_err(|source| PersistenceError::Write {
                        path: self.path.clone(),
                        source,
                    })?;
                    sink.emit(
                        EventLevel::Warn,
                        &format!("{}; moved it to {}", e, aside.display()),
                    );
                }
            }
        }
        combined.extend_from_slice(records);

        let json = serde_json::to_string_pretty(&combined)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json)
            .and_then(|()| fs::rename(&temp_path, &self.path))
            .map_err(|source| {
                let _ = fs::remove_file(&temp_path);
                PersistenceError::Write {
                    path: self.path.clone(),
                    source,
                }
            })?;

        sink.emit(
            EventLevel::Info,
            &format!("Undo log saved to: {}", self.path.display()),
        );
        Ok(())
    }

    /// Renames the log to `<stem>_<timestamp>.<ext>` and returns the new path.
    pub fn archive(&self, clock: &dyn Clock) -> Result<PathBuf, UndoError> {
        let target = self.archive_target(clock, "");
        fs::rename(&self.path, &target).map_err(|source| UndoError::Archive {
            path: self.path.clone(),
            source,
        })?;
        Ok(target)
    }

    /// True for the log itself, its temporary file and its archives.
    pub fn is_reserved_name(&self, file_name: &str) -> bool {
        let Some(own_name) = self.path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if file_name == own_name || file_name == format!("{}.tmp", own_name) {
            return true;
        }

        self.is_archive_name(file_name)
    }

    /// Matches `<stem>_[corrupt_]YYYYMMDD_HHMMSS[_NNN]<ext>`, the names
    /// produced by [`archive`](Self::archive) and by moving a corrupt log aside.
    fn is_archive_name(&self, file_name: &str) -> bool {
        let (stem, ext) = self.stem_and_extension();
        let Some(middle) = file_name
            .strip_prefix(stem.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(ext.as_str()))
        else {
            return false;
        };
        let middle = middle.strip_prefix("corrupt_").unwrap_or(middle);

        let Some((token, counter)) = middle.split_at_checked(15) else {
            return false;
        };
        let token_ok = token.char_indices().all(|(i, c)| {
            if i == 8 {
                c == '_'
            } else {
                c.is_ascii_digit()
            }
        });
        let counter_ok = counter.is_empty()
            || counter.strip_prefix('_').is_some_and(|digits| {
                digits.len() >= 3 && digits.chars().all(|c| c.is_ascii_digit())
            });
        token_ok && counter_ok
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn stem_and_extension(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (stem, ext)
    }

    fn archive_target(&self, clock: &dyn Clock, label: &str) -> PathBuf {
        let (stem, ext) = self.stem_and_extension();
        let token = file_token(&clock.now());

        let mut target = self
            .path
            .with_file_name(format!("{}_{}{}{}", stem, label, token, ext));
        let mut counter = 1;
        while target.exists() {
            target = self.path.with_file_name(format!(
                "{}_{}{}_{:03}{}",
                stem, label, token, counter, ext
            ));
            counter += 1;
        }
        target
    }
}
