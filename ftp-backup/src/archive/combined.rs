//! The combined archive: every per-source archive of a run in one file.

use super::{needs_zip64, ArchiveEntry, RunId};
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write `<backup_root>/ALL_BACKUP_<runId>.zip` holding each entry at
/// `<source>/<runId>.zip`.
///
/// The archive is assembled in a `.part` file and renamed once complete, so
/// the final path either holds a finished archive or does not exist.
pub fn compose_combined(
    entries: &[ArchiveEntry],
    run_id: &RunId,
    backup_root: &Path,
) -> Result<PathBuf> {
    let final_path = backup_root.join(run_id.combined_name());
    let partial_path = final_path.with_extension("zip.part");

    let composed = write_combined(entries, backup_root, &partial_path).and_then(|count| {
        fs::rename(&partial_path, &final_path)?;
        Ok(count)
    });

    match composed {
        Ok(count) => {
            info!(archive = %final_path.display(), sources = count, "Combined archive created");
            Ok(final_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial_path);
            Err(BackupError::Composition(format!("{}: {}", final_path.display(), e)))
        }
    }
}

fn write_combined(entries: &[ArchiveEntry], backup_root: &Path, path: &Path) -> Result<usize> {
    fs::create_dir_all(backup_root)?;
    let mut writer = ZipWriter::new(BufWriter::new(File::create(path)?));

    for entry in entries {
        let mut input = File::open(&entry.path)?;
        let size = input.metadata()?.len();
        // Inputs are already compressed
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(needs_zip64(size));
        writer.start_file(entry.combined_path(), options)?;
        io::copy(&mut input, &mut writer)?;
    }

    let mut file = writer.finish()?;
    file.flush()?;
    file.get_ref().sync_all()?;
    Ok(entries.len())
}
