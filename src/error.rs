//! Error types for organizing and undoing.
//!
//! Failures fall into two groups. Fatal errors ([`OrganizeError`],
//! [`UndoError`], [`ConfigError`]) stop an operation before it touches
//! anything. Per-file errors ([`FileError`]) and persistence errors
//! ([`PersistenceError`]) are values recorded in a report while the run
//! carries on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Category name must not be empty")]
    EmptyCategoryName,

    #[error("Category '{0}' is defined more than once")]
    DuplicateCategory(String),

    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("Refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Fatal errors that abort an organize run before any file is processed.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Source path does not exist: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Source path is not a directory: {}", path.display())]
    SourceNotDirectory { path: PathBuf },

    #[error("Could not read source directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A failure confined to a single file. The run continues past it.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Permission denied: {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("OS error with {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot generate unique name for {}", path.display())]
    NameSpaceExhausted { path: PathBuf },

    #[error("File name is missing or not valid UTF-8: {}", path.display())]
    InvalidFileName { path: PathBuf },
}

impl FileError {
    /// Classifies an IO error raised while handling `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path, source }
        } else {
            Self::Io { path, source }
        }
    }
}

/// The undo log could not be written. Moves already made stand.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Could not write undo log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not serialize undo log: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort an undo as a whole.
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("No undo log found at: {}", path.display())]
    NoUndoLogFound { path: PathBuf },

    #[error("Undo log {} is corrupt: {reason}", path.display())]
    CorruptUndoLog { path: PathBuf, reason: String },

    #[error("Could not read undo log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not archive undo log {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OrganizeError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl UndoError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
