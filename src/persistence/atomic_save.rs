//! Atomic file replacement
//!
//! Data is written to a sibling temp file, checked, and renamed over the
//! target. A reader of the target sees either the old bytes or the new bytes,
//! never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::persistence::{corrupted_data, PersistenceErrorContext, PersistenceResult};

/// Temp file used while replacing `path` (`generators.json.tmp`)
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes`, returning the number of bytes written
///
/// The temp file is removed on any failure, leaving `path` untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> PersistenceResult<u64> {
    let temp_path = temp_path_for(path);
    let result = write_and_replace(path, &temp_path, bytes);
    if result.is_err() && temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            log::warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
        }
    }
    result
}

fn write_and_replace(path: &Path, temp_path: &Path, bytes: &[u8]) -> PersistenceResult<u64> {
    {
        let mut file = File::create(temp_path).persistence_context("Failed to create temp file")?;
        file.write_all(bytes).persistence_context("Failed to write temp file")?;
        file.sync_all().persistence_context("Failed to sync temp file")?;
    }

    let written = fs::metadata(temp_path)
        .persistence_context("Failed to stat temp file")?
        .len();
    if written == 0 {
        return Err(corrupted_data(format!(
            "temp file {} is empty, refusing to replace {}",
            temp_path.display(),
            path.display()
        )));
    }

    fs::rename(temp_path, path).persistence_context("Failed to replace data file")?;
    Ok(written)
}
