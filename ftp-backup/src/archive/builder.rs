//! Per-source archive creation.

use super::{needs_zip64, ArchiveEntry, Compression, RunId, SourceKind, SourceSpec};
use crate::fs::walker::{total_size, walk_directory, WalkOptions};
use crate::transfer::progress::format_bytes;
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Turns one source into `<destination>/<runId>.zip`.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    compression: Compression,
    compression_level: Option<i64>,
    walk_options: WalkOptions,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new(Compression::default(), None, WalkOptions::default())
    }
}

impl ArchiveBuilder {
    pub fn new(
        compression: Compression,
        compression_level: Option<i64>,
        walk_options: WalkOptions,
    ) -> Self {
        Self {
            compression,
            compression_level,
            walk_options,
        }
    }

    /// Archive `source` for `run_id` into `destination_dir`.
    ///
    /// Returns `Ok(None)` when the source path is neither a directory nor a
    /// regular file. Read and write failures come back as
    /// [`BackupError::SourceArchive`] and leave no partial archive behind.
    pub fn build(
        &self,
        source: &SourceSpec,
        run_id: &RunId,
        destination_dir: &Path,
    ) -> Result<Option<ArchiveEntry>> {
        let archive_error = |e: BackupError| BackupError::SourceArchive {
            name: source.name.clone(),
            reason: e.to_string(),
        };

        fs::create_dir_all(destination_dir).map_err(|e| archive_error(e.into()))?;

        let Some(kind) = source.kind() else {
            warn!(
                source = %source.name,
                path = %source.path.display(),
                "Source is neither a directory nor a file, skipping"
            );
            return Ok(None);
        };

        let archive_path = destination_dir.join(run_id.archive_name());
        let written = match kind {
            SourceKind::Directory => self.write_directory(&source.path, &archive_path),
            SourceKind::SingleFile => self.write_single_file(&source.path, &archive_path),
        };

        match written {
            Ok(bytes) => {
                info!(
                    source = %source.name,
                    archive = %archive_path.display(),
                    "Archived {} ({:?})",
                    format_bytes(bytes),
                    kind
                );
                Ok(Some(ArchiveEntry {
                    source_name: source.name.clone(),
                    run_id: run_id.clone(),
                    path: archive_path,
                }))
            }
            Err(e) => {
                let _ = fs::remove_file(&archive_path);
                Err(archive_error(e))
            }
        }
    }

    /// Archive a whole tree, preserving relative paths. Returns input bytes.
    fn write_directory(&self, root: &Path, archive_path: &Path) -> Result<u64> {
        let entries = walk_directory(root, self.walk_options.clone())?;
        debug!(
            root = %root.display(),
            entries = entries.len(),
            "Walking {} of source data",
            format_bytes(total_size(&entries))
        );

        let mut writer = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
        let mut bytes = 0;

        for entry in &entries {
            // The destination may live inside the tree being archived
            if entry.path == archive_path {
                continue;
            }

            let name = entry.archive_name();
            if entry.is_symlink {
                debug!(link = %entry.path.display(), "Archiving symlink target as {}", name);
            }
            if entry.is_dir {
                if is_empty_dir(&entry.path)? {
                    writer.add_directory(name, SimpleFileOptions::default())?;
                }
                continue;
            }

            bytes += self.append_file(&mut writer, &entry.path, &name)?;
        }

        writer.finish()?.flush()?;
        Ok(bytes)
    }

    /// Archive a single file under its base name. Returns input bytes.
    fn write_single_file(&self, file: &Path, archive_path: &Path) -> Result<u64> {
        let name = file
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source file has no name"))?
            .to_string_lossy()
            .into_owned();

        let mut writer = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
        let bytes = self.append_file(&mut writer, file, &name)?;
        writer.finish()?.flush()?;
        Ok(bytes)
    }

    fn append_file<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        file: &Path,
        name: &str,
    ) -> Result<u64> {
        let mut input = File::open(file)?;
        let size = input.metadata()?.len();
        writer.start_file(name, self.file_options(size))?;
        let copied = io::copy(&mut input, writer)?;
        debug!(file = %name, size = copied, "Added to archive");
        Ok(copied)
    }

    fn file_options(&self, size: u64) -> SimpleFileOptions {
        // Stored entries reject an explicit level
        let level = match self.compression {
            Compression::Stored => None,
            _ => self.compression_level,
        };

        SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .compression_level(level)
            .large_file(needs_zip64(size))
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}
