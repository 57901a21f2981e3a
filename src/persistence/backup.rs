use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::persistence::{PersistenceError, PersistenceErrorContext, PersistenceResult};

/// Timestamp format embedded in backup file names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Manages timestamped copies of a data file
///
/// Backups are named `<prefix>_<YYYY-MM-DD_HH-mm-ss>.json` and ordered by the
/// timestamp in the name. Files in the backup directory whose names do not
/// parse are left alone and never counted.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    prefix: String,
    max_backups: usize,
}

/// Information about a backup
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    /// Local time parsed from the file name
    pub created_at: NaiveDateTime,
    pub size: u64,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>, prefix: &str, max_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            prefix: prefix.to_string(),
            max_backups: max_backups.max(1),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy `source` to a backup stamped with the current local time
    pub fn create_backup(&self, source: &Path) -> PersistenceResult<BackupInfo> {
        self.create_backup_at(source, Local::now().naive_local())
    }

    /// Copy `source` to a backup stamped with `timestamp`
    ///
    /// A backup with the same second-resolution stamp is overwritten.
    pub fn create_backup_at(&self, source: &Path, timestamp: NaiveDateTime) -> PersistenceResult<BackupInfo> {
        if !source.exists() {
            return Err(PersistenceError::BackupError(format!(
                "nothing to back up at {}",
                source.display()
            )));
        }

        fs::create_dir_all(&self.backup_dir).persistence_context("Failed to create backup directory")?;

        let name = self.backup_name(timestamp);
        let path = self.backup_dir.join(&name);
        let size = fs::copy(source, &path).map_err(|e| {
            PersistenceError::BackupError(format!("failed to copy {} to {}: {}", source.display(), path.display(), e))
        })?;

        log::debug!("Created backup: {}", name);
        Ok(BackupInfo {
            name,
            path,
            created_at: timestamp,
            size,
        })
    }

    /// File name for a backup taken at `timestamp`
    pub fn backup_name(&self, timestamp: NaiveDateTime) -> String {
        format!("{}_{}.json", self.prefix, timestamp.format(BACKUP_TIMESTAMP_FORMAT))
    }

    /// Parse the timestamp out of a backup file name
    pub fn parse_backup_name(&self, name: &str) -> Option<NaiveDateTime> {
        let stamp = name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')?
            .strip_suffix(".json")?;
        NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
    }

    /// All backups, newest first
    pub fn list_backups(&self) -> PersistenceResult<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir).persistence_context("Failed to list backups")? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(created_at) = self.parse_backup_name(&name) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                name,
                path: entry.path(),
                created_at,
                size: metadata.len(),
            });
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Delete the oldest backups beyond `max_backups`, returning how many went
    pub fn cleanup_old_backups(&self) -> PersistenceResult<usize> {
        let backups = self.list_backups()?;
        let mut removed = 0;
        for backup in backups.iter().skip(self.max_backups) {
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    log::debug!("Deleted old backup: {}", backup.name);
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to delete old backup {}: {}", backup.name, e),
            }
        }
        Ok(removed)
    }
}
