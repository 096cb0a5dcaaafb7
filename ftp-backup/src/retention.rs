//! Count-based retention shared by local and remote archive directories.
//!
//! Archive names embed a fixed-width `YYYY-MM-DD_HH-MM` run id, so a
//! descending name sort puts the newest entries first.

use crate::archive::ARCHIVE_EXT;
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_KEEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: DEFAULT_KEEP }
    }
}

impl RetentionPolicy {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Entries outside the retention window, newest first.
    pub fn expired<S: AsRef<str>>(&self, entries: &[S]) -> Vec<String> {
        prune(entries, self.keep)
    }
}

/// Sort `entries` by name descending and return everything past the first
/// `keep`.
pub fn prune<S: AsRef<str>>(entries: &[S], keep: usize) -> Vec<String> {
    let mut names: Vec<&str> = entries.iter().map(AsRef::as_ref).collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.into_iter().skip(keep).map(str::to_owned).collect()
}

/// Delete each name with `delete`, independently.
///
/// A failed delete is logged as a warning and does not stop the others.
/// Returns the names actually removed.
pub fn remove_expired<F>(names: &[String], mut delete: F) -> Vec<String>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut removed = Vec::with_capacity(names.len());

    for name in names {
        match delete(name) {
            Ok(()) => {
                info!(entry = %name, "Removed old backup");
                removed.push(name.clone());
            }
            Err(e) => {
                let err = BackupError::RetentionDelete {
                    entry: name.clone(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
            }
        }
    }

    removed
}

/// Archive file names in a local directory. A missing directory is empty.
pub fn list_local(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == ARCHIVE_EXT) {
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
    }

    Ok(names)
}

/// Apply `policy` to the archives in `dir`. Returns the removed names.
pub fn prune_local(dir: &Path, policy: &RetentionPolicy) -> Result<Vec<String>> {
    let names = list_local(dir)?;
    let expired = policy.expired(&names);
    Ok(remove_expired(&expired, |name| {
        fs::remove_file(dir.join(name)).map_err(BackupError::from)
    }))
}
