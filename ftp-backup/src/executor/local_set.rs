//! Local half of a run: per-source archives, local retention, combined archive.

use crate::archive::{compose_combined, ArchiveBuilder, ArchiveEntry, RunId, SourceSpec};
use crate::retention::{self, RetentionPolicy};
use crate::utils::errors::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What the local half of a run produced.
#[derive(Debug, Clone)]
pub struct LocalOutcome {
    /// Path of the combined archive
    pub combined: PathBuf,
    /// Per-source archives produced by this run
    pub archived: Vec<ArchiveEntry>,
    /// Sources with no archive this run (missing or failed)
    pub skipped: Vec<String>,
    /// Old per-source archives removed by retention
    pub pruned: Vec<PathBuf>,
}

pub struct LocalBackupSet {
    builder: ArchiveBuilder,
    policy: RetentionPolicy,
}

impl LocalBackupSet {
    pub fn new(builder: ArchiveBuilder, policy: RetentionPolicy) -> Self {
        Self { builder, policy }
    }

    /// Archive every source into `backup_root/<name>/`, prune each of those
    /// directories, then compose the combined archive from this run's
    /// entries.
    ///
    /// Per-source failures are logged and the source is left out; only a
    /// failed composition is returned as an error.
    pub fn run(
        &self,
        sources: &[SourceSpec],
        run_id: &RunId,
        backup_root: &Path,
    ) -> Result<LocalOutcome> {
        let mut archived = Vec::new();
        let mut skipped = Vec::new();
        let mut pruned = Vec::new();

        for source in sources {
            let destination = backup_root.join(&source.name);

            match self.builder.build(source, run_id, &destination) {
                Ok(Some(entry)) => archived.push(entry),
                Ok(None) => skipped.push(source.name.clone()),
                Err(e) => {
                    warn!("{}", e);
                    skipped.push(source.name.clone());
                }
            }

            match retention::prune_local(&destination, &self.policy) {
                Ok(removed) => {
                    pruned.extend(removed.into_iter().map(|name| destination.join(name)))
                }
                Err(e) => warn!(dir = %destination.display(), "Could not apply retention: {}", e),
            }
        }

        info!(
            run_id = %run_id,
            archived = archived.len(),
            skipped = skipped.len(),
            "Per-source archives done"
        );

        let combined = compose_combined(&archived, run_id, backup_root)?;

        Ok(LocalOutcome {
            combined,
            archived,
            skipped,
            pruned,
        })
    }
}
