//! Archive naming and the types shared by per-source and combined archives.
//!
//! Every artifact of a run is named after its [`RunId`], a zero-padded
//! `YYYY-MM-DD_HH-MM` timestamp. Because the format is fixed-width, sorting
//! names lexicographically sorts them chronologically, which is what
//! retention relies on.

pub mod builder;
pub mod combined;

pub use builder::ArchiveBuilder;
pub use combined::compose_combined;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File extension of every archive produced
pub const ARCHIVE_EXT: &str = "zip";

/// Name prefix of the combined archive
pub const COMBINED_PREFIX: &str = "ALL_BACKUP_";

const RUN_ID_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Entries at or above this size get ZIP64 headers. Half the 32-bit limit,
/// since a source file can still grow while it is being read.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64 / 2;

/// Timestamp-derived identifier shared by every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(String);

impl RunId {
    /// Generate the identifier for a run starting now (local time)
    pub fn now() -> Self {
        Self::from_datetime(&Local::now().naive_local())
    }

    pub fn from_datetime(at: &NaiveDateTime) -> Self {
        Self(at.format(RUN_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<runId>.zip`, the per-source archive file name
    pub fn archive_name(&self) -> String {
        format!("{}.{}", self.0, ARCHIVE_EXT)
    }

    /// `ALL_BACKUP_<runId>.zip`, the combined archive file name
    pub fn combined_name(&self) -> String {
        format!("{}{}.{}", COMBINED_PREFIX, self.0, ARCHIVE_EXT)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named entry of the backup manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
}

/// What a source path turned out to be when inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Directory,
    SingleFile,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Inspect the path. None when it is missing or neither a directory
    /// nor a regular file.
    pub fn kind(&self) -> Option<SourceKind> {
        let metadata = std::fs::metadata(&self.path).ok()?;
        if metadata.is_dir() {
            Some(SourceKind::Directory)
        } else if metadata.is_file() {
            Some(SourceKind::SingleFile)
        } else {
            None
        }
    }
}

/// A per-source archive produced during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub source_name: String,
    pub run_id: RunId,
    pub path: PathBuf,
}

impl ArchiveEntry {
    /// Location of this entry inside the combined archive
    pub fn combined_path(&self) -> String {
        format!("{}/{}", self.source_name, self.run_id.archive_name())
    }
}

/// Compression applied to entries of per-source archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Zstd,
    Stored,
}

impl Compression {
    pub fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflate => zip::CompressionMethod::Deflated,
            Compression::Zstd => zip::CompressionMethod::Zstd,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

pub(crate) fn needs_zip64(size: u64) -> bool {
    size >= ZIP64_THRESHOLD
}
