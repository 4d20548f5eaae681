//! In-memory record of successful backups.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::BackupMode;

/// Last successfully backed-up modification time per file.
///
/// Lives only as long as its scheduler; a new scheduler starts empty and
/// therefore backs everything up once.
#[derive(Debug, Default)]
pub struct BackupRecord {
    last_backup: HashMap<PathBuf, DateTime<Utc>>,
}

impl BackupRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path`, last modified at `modified`, must be uploaded.
    pub fn needs_backup(&self, path: &Path, modified: DateTime<Utc>, mode: BackupMode) -> bool {
        match mode {
            BackupMode::Full => true,
            BackupMode::Incremental => match self.last_backup.get(path) {
                None => true,
                Some(last) => modified > *last,
            },
        }
    }

    /// Remember a successful backup.
    pub fn mark_backed_up(&mut self, path: &Path, modified: DateTime<Utc>) {
        self.last_backup.insert(path.to_path_buf(), modified);
    }

    /// Recorded backup time for `path`.
    pub fn last_backup(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.last_backup.get(path).copied()
    }

    /// Number of files with a recorded backup.
    pub fn len(&self) -> usize {
        self.last_backup.len()
    }

    /// Whether nothing has been backed up yet.
    pub fn is_empty(&self) -> bool {
        self.last_backup.is_empty()
    }
}
