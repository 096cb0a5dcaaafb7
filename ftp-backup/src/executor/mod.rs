//! Backup run coordinator.
//!
//! Drives one run end to end:
//! - probe the remote store before any local work
//! - build per-source archives and the combined archive
//! - upload the combined archive and prune the remote directory
//! - remove the combined archive locally
//!
//! Fatal errors stop the run where they happen. On upload failure the
//! combined archive stays on disk for manual recovery.

pub mod local_set;

use crate::archive::{ArchiveBuilder, RunId, SourceSpec};
use crate::config::Config;
use crate::fs::walker::WalkOptions;
use crate::retention::RetentionPolicy;
use crate::transfer::ftp::FtpConnector;
use crate::transfer::progress::format_bytes;
use crate::transfer::{Connector, TransferClient};
use crate::utils::errors::Result;
pub use local_set::{LocalBackupSet, LocalOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub archived: Vec<String>,
    pub skipped: Vec<String>,
    pub combined_name: String,
    pub uploaded_bytes: u64,
    pub local_pruned: usize,
    pub remote_pruned: Vec<String>,
}

impl RunReport {
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            archived = self.archived.len(),
            skipped = self.skipped.len(),
            local_pruned = self.local_pruned,
            remote_pruned = self.remote_pruned.len(),
            "Backup uploaded successfully: {} ({})",
            self.combined_name,
            format_bytes(self.uploaded_bytes)
        );
        if !self.skipped.is_empty() {
            warn!("Sources without an archive this run: {}", self.skipped.join(", "));
        }
    }
}

pub struct BackupRun<C: Connector> {
    sources: Vec<SourceSpec>,
    backup_root: PathBuf,
    remote_dir: String,
    policy: RetentionPolicy,
    local: LocalBackupSet,
    transfer: TransferClient<C>,
}

impl<C: Connector> BackupRun<C> {
    pub fn new(
        sources: Vec<SourceSpec>,
        backup_root: PathBuf,
        remote_dir: String,
        policy: RetentionPolicy,
        local: LocalBackupSet,
        transfer: TransferClient<C>,
    ) -> Self {
        Self {
            sources,
            backup_root,
            remote_dir,
            policy,
            local,
            transfer,
        }
    }

    /// Only the connectivity pre-flight.
    pub fn check(&self) -> Result<()> {
        self.transfer.probe()
    }

    /// Run every step for `run_id`.
    pub fn execute(&self, run_id: &RunId) -> Result<RunReport> {
        info!(
            run_id = %run_id,
            sources = self.sources.len(),
            root = %self.backup_root.display(),
            "Starting backup run"
        );

        self.transfer.probe()?;

        let local = self.local.run(&self.sources, run_id, &self.backup_root)?;

        let uploaded = match self.transfer.upload(&local.combined, &self.remote_dir) {
            Ok(uploaded) => uploaded,
            Err(e) => {
                error!(
                    archive = %local.combined.display(),
                    "Upload failed, combined archive kept for manual recovery"
                );
                return Err(e);
            }
        };

        let remote_pruned = match self.transfer.prune_remote(&uploaded.remote_dir, &self.policy) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(dir = %uploaded.remote_dir, "Remote retention skipped: {}", e);
                Vec::new()
            }
        };

        remove_combined(&local.combined);

        Ok(RunReport {
            run_id: run_id.clone(),
            archived: local.archived.iter().map(|e| e.source_name.clone()).collect(),
            skipped: local.skipped,
            combined_name: run_id.combined_name(),
            uploaded_bytes: uploaded.bytes,
            local_pruned: local.pruned.len(),
            remote_pruned,
        })
    }
}

fn remove_combined(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => info!(archive = %path.display(), "Removed local combined archive"),
        Err(e) => warn!(archive = %path.display(), "Could not remove combined archive: {}", e),
    }
}

/// Build an FTP-backed run from validated configuration.
pub fn from_config(config: &Config) -> Result<BackupRun<FtpConnector>> {
    let target = config.validate()?;
    let policy = RetentionPolicy::new(config.backup.keep);

    let builder = ArchiveBuilder::new(
        config.backup.compression,
        config.backup.compression_level,
        WalkOptions::with_excludes(config.backup.exclude_patterns.clone()),
    );
    let local = LocalBackupSet::new(builder, policy);
    let connector = FtpConnector::new(target.host, target.port);
    let transfer = TransferClient::new(connector, target.credentials);

    Ok(BackupRun::new(
        config.sources.clone(),
        config.backup.root.clone(),
        target.dir,
        policy,
        local,
        transfer,
    ))
}
