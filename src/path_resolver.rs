//! Collision-free destination paths.

use crate::clock::{Clock, file_token};
use crate::error::FileError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Highest counter tried before giving up on a name.
pub const MAX_CONFLICT_SUFFIX: u32 = 999;

/// A destination path that did not exist when it was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// True when the original name was taken and a suffixed name was chosen.
    pub renamed: bool,
}

/// Computes where a file should land inside a destination directory.
///
/// The original file name is kept when free. Otherwise the name becomes
/// `stem_<YYYYMMDD_HHMMSS>_NNN.ext`, with the timestamp read once per call
/// and `NNN` counting up from `001`.
pub struct PathResolver<'a> {
    clock: &'a dyn Clock,
}

impl<'a> PathResolver<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Resolves a free path for `original_path` inside `destination_dir`.
    ///
    /// A path counts as taken if it exists on disk or is in `claimed`, the
    /// destinations already handed out earlier in the same run.
    ///
    /// # Errors
    ///
    /// [`FileError::NameSpaceExhausted`] if every candidate up to
    /// [`MAX_CONFLICT_SUFFIX`] is taken, [`FileError::InvalidFileName`] if
    /// `original_path` has no file name.
    pub fn resolve(
        &self,
        destination_dir: &Path,
        original_path: &Path,
        claimed: &HashSet<PathBuf>,
    ) -> Result<Resolution, FileError> {
        let file_name = original_path
            .file_name()
            .ok_or_else(|| FileError::InvalidFileName {
                path: original_path.to_path_buf(),
            })?;

        let destination = destination_dir.join(file_name);
        if !occupied(&destination, claimed) {
            return Ok(Resolution {
                path: destination,
                renamed: false,
            });
        }

        let token = file_token(&self.clock.now());
        let stem = original_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = original_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        for counter in 1..=MAX_CONFLICT_SUFFIX {
            let candidate =
                destination_dir.join(format!("{}_{}_{:03}{}", stem, token, counter, suffix));
            if !occupied(&candidate, claimed) {
                return Ok(Resolution {
                    path: candidate,
                    renamed: true,
                });
            }
        }

        Err(FileError::NameSpaceExhausted {
            path: original_path.to_path_buf(),
        })
    }
}

/// A dangling symlink still occupies its name.
fn occupied(path: &Path, claimed: &HashSet<PathBuf>) -> bool {
    claimed.contains(path) || path.symlink_metadata().is_ok()
}
