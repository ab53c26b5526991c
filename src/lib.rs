//! dirsort - sort loose files into category subdirectories, reversibly.
//!
//! Files are classified by extension, moved into one subdirectory per
//! category without ever overwriting anything, and every move is written to
//! an undo log so the whole run can be reversed. Dry runs report the same
//! plan without touching the filesystem.

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod file_category;
pub mod mover;
pub mod operation_log;
pub mod organizer;
pub mod output;
pub mod path_resolver;
pub mod undo;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CompiledFilters, OrganizerConfig};
pub use error::{ConfigError, FileError, OrganizeError, PersistenceError, UndoError};
pub use events::{EventLevel, EventSink, MemorySink, TracingSink};
pub use file_category::{CategoryTable, Classifier, FALLBACK_CATEGORY};
pub use operation_log::{OperationLog, OperationRecord};
pub use organizer::{Organizer, RunConfig, RunReport, RunStatistics};
pub use undo::{UndoEngine, UndoReport};

pub use cli::{Cli, OrganizeCommand, run_cli};

use std::path::Path;

/// Organizes `config.source_directory` using the system clock.
pub fn run(
    config: &RunConfig,
    table: CategoryTable,
    filters: CompiledFilters,
    sink: &dyn EventSink,
) -> Result<RunReport, OrganizeError> {
    Organizer::new(table, &SystemClock, sink)
        .with_filters(filters)
        .run(config)
}

/// Reverses the run recorded in the undo log at `log_path`.
pub fn undo(log_path: &Path, sink: &dyn EventSink) -> Result<UndoReport, UndoError> {
    UndoEngine::new(&SystemClock, sink).undo(log_path)
}
