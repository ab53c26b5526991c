//! Time source used for conflict names, record timestamps and archive names.

use chrono::{DateTime, Local};

/// Supplies the current local time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Second-resolution token used in generated file names, e.g. `20240131_094500`.
pub fn file_token(time: &DateTime<Local>) -> String {
    time.format("%Y%m%d_%H%M%S").to_string()
}
