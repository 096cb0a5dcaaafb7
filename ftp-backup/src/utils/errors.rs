//! Error types for a backup run.
//!
//! `SourceArchive` and `RetentionDelete` are recovered where they occur and
//! only ever logged; every other kind ends the run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot connect to remote store: {0}")]
    Connectivity(String),

    #[error("Failed to archive source {name}: {reason}")]
    SourceArchive { name: String, reason: String },

    #[error("Could not delete {entry}: {reason}")]
    RetentionDelete { entry: String, reason: String },

    #[error("Failed to compose combined archive: {0}")]
    Composition(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Transfer error: {0}")]
    Transfer(String),
}

impl BackupError {
    /// Whether this error terminates the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            BackupError::SourceArchive { .. } | BackupError::RetentionDelete { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
