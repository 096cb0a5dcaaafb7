//! Directory traversal for archiving.
//!
//! Produces every file and directory below a root, sorted by name, with
//! paths relative to that root.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Entry names containing any of these are skipped, including their subtrees
    pub exclude_patterns: Vec<String>,
}

impl WalkOptions {
    pub fn with_excludes(exclude_patterns: Vec<String>) -> Self {
        Self {
            exclude_patterns,
            ..Self::default()
        }
    }
}

/// Information about an entry discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the entry
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Is this a directory?
    pub is_dir: bool,

    /// Is this a symlink?
    pub is_symlink: bool,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Symlinks resolve to their target; links to directories and broken
    /// links yield None.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let raw_metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        let is_symlink = entry.path_is_symlink();

        let (size, is_dir) = if is_symlink {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_dir() => return Ok(None),
                Ok(resolved) => (resolved.len(), false),
                Err(_) => return Ok(None),
            }
        } else if raw_metadata.is_dir() {
            (0, true)
        } else {
            (raw_metadata.len(), false)
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
            is_dir,
            is_symlink,
        }))
    }

    /// Relative path with `/` separators, as stored inside an archive.
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk a directory tree and collect all files and subdirectories.
///
/// The root itself is not included. Entries come back in file-name order so
/// two walks of an unchanged tree produce the same sequence.
pub fn walk_directory(root: &Path, options: WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    let mut entries = Vec::new();

    let iter = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_exclude(e, &options.exclude_patterns));

    for entry in iter {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }

        if let Some(info) = FileInfo::from_entry(&entry, root)? {
            entries.push(info);
        }
    }

    Ok(entries)
}

/// Total size of the files in a walk result
pub fn total_size(entries: &[FileInfo]) -> u64 {
    entries.iter().filter(|e| !e.is_dir).map(|e| e.size).sum()
}

/// Check if a directory entry should be excluded based on patterns
fn should_exclude(entry: &DirEntry, patterns: &[String]) -> bool {
    let file_name = entry.file_name().to_string_lossy();
    patterns.iter().any(|pattern| file_name.contains(pattern.as_str()))
}
