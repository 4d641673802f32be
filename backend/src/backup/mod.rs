//! Backups of the sheet content taken before it is overwritten.
//!
//! Each backup is one JSON file in the backup directory, named after its id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};
use crate::models::Row;

/// Directory where backups are stored (relative to current dir)
pub const DEFAULT_BACKUP_DIR: &str = ".sheetsync/backups";

/// A stored backup with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBackup {
    /// Unique identifier, also the file stem
    pub id: String,
    /// What was backed up, usually `<spreadsheet id>/<range>`
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub row_count: usize,
    /// Grid as it was read, header included
    pub rows: Vec<Row>,
}

/// Destination for backups. Saving is best-effort from the pipeline's view.
pub trait BackupSink: Send + Sync {
    /// Persist `rows` under `key`, returning the backup id.
    fn save(&self, key: &str, rows: &[Row]) -> BackupResult<String>;
}

/// Backups kept as JSON files in one directory
#[derive(Debug, Clone)]
pub struct DirectoryBackup {
    dir: PathBuf,
}

impl DirectoryBackup {
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_BACKUP_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All readable backups, newest first. Unreadable files are skipped.
    pub fn list(&self) -> BackupResult<Vec<StoredBackup>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups: Vec<StoredBackup> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .filter_map(|path| fs::read_to_string(path).ok())
            .filter_map(|content| serde_json::from_str(&content).ok())
            .collect();

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Load one backup by id
    pub fn get(&self, id: &str) -> BackupResult<StoredBackup> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(BackupError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Most recent backup taken for `key`
    pub fn latest(&self, key: &str) -> BackupResult<StoredBackup> {
        self.list()?
            .into_iter()
            .find(|b| b.key == key)
            .ok_or_else(|| BackupError::NotFound(key.to_string()))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8])
    }
}

impl Default for DirectoryBackup {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupSink for DirectoryBackup {
    fn save(&self, key: &str, rows: &[Row]) -> BackupResult<String> {
        fs::create_dir_all(&self.dir)?;

        let created_at = Utc::now();
        let backup = StoredBackup {
            id: Self::generate_id(created_at),
            key: key.to_string(),
            created_at,
            row_count: rows.len(),
            rows: rows.to_vec(),
        };

        let content = serde_json::to_string_pretty(&backup)?;
        fs::write(self.path_for(&backup.id), content)?;
        Ok(backup.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use tempfile::tempdir;

    fn grid() -> Vec<Row> {
        vec![
            vec![Cell::from("url"), Cell::from("price")],
            vec![Cell::from("a.com"), Cell::from(10)],
        ]
    }

    #[test]
    fn test_save_and_get() {
        let dir = tempdir().unwrap();
        let backups = DirectoryBackup::with_dir(dir.path().join("backups"));

        let id = backups.save("sheet/Sheet1", &grid()).unwrap();
        let stored = backups.get(&id).unwrap();
        assert_eq!(stored.key, "sheet/Sheet1");
        assert_eq!(stored.row_count, 2);
        assert_eq!(stored.rows, grid());
    }

    #[test]
    fn test_list_newest_first_and_latest() {
        let dir = tempdir().unwrap();
        let backups = DirectoryBackup::with_dir(dir.path());

        let first = backups.save("a", &grid()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = backups.save("b", &grid()[..1]).unwrap();
        std::fs::write(dir.path().join("junk.json"), "not a backup").unwrap();

        let listed = backups.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].id, first);
        assert_eq!(backups.latest("a").unwrap().id, first);
        assert!(matches!(backups.latest("zzz"), Err(BackupError::NotFound(_))));
    }

    #[test]
    fn test_missing_backup() {
        let dir = tempdir().unwrap();
        let backups = DirectoryBackup::with_dir(dir.path());
        assert!(backups.list().unwrap().is_empty());
        assert!(matches!(backups.get("nope"), Err(BackupError::NotFound(_))));
    }
}
