//! In-memory remote storage for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use drivekeeper_common::{Error, Result};

use crate::remote::RemoteStorage;

/// A stored object.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    parent: Option<String>,
    is_folder: bool,
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory remote storage.
///
/// Useful for testing and dry runs. All data is stored in memory and lost on
/// drop. Call counters and per-name failure injection let tests observe what
/// the backup core asked for.
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
    failing: RwLock<HashSet<String>>,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Make every create/update of a file called `name` fail with a network
    /// error until [`MemoryStorage::clear_failure`] is called.
    pub fn fail_uploads_of(&self, name: &str) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Stop injecting failures for `name`.
    pub fn clear_failure(&self, name: &str) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Number of `create_file` calls seen so far, including failed ones.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_file` calls seen so far, including failed ones.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Content of the file named `name` inside `parent_id`.
    pub fn file_content(&self, name: &str, parent_id: &str) -> Option<Vec<u8>> {
        self.read()
            .values()
            .find(|e| !e.is_folder && e.name == name && e.parent.as_deref() == Some(parent_id))
            .map(|e| e.data.clone())
    }

    /// Number of stored files (folders excluded).
    pub fn file_count(&self) -> usize {
        self.read().values().filter(|e| !e.is_folder).count()
    }

    /// Number of stored folders.
    pub fn folder_count(&self) -> usize {
        self.read().values().filter(|e| e.is_folder).count()
    }

    /// Delete an object by id, as if it had been removed by another client.
    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self, name: &str) -> Result<()> {
        let failing = self.failing.read().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(name) {
            return Err(Error::Network(format!("simulated failure for {}", name)));
        }
        Ok(())
    }

    fn find(&self, name: &str, parent_id: Option<&str>, folder: bool) -> Option<String> {
        let entries = self.read();
        let mut matches: Vec<(&String, &Entry)> = entries
            .iter()
            .filter(|(_, e)| e.is_folder == folder && e.name == name)
            .filter(|(_, e)| e.parent.as_deref() == parent_id)
            .collect();
        // Oldest first, like a store that returns objects in creation order.
        matches.sort_by_key(|(_, e)| e.modified);
        matches.first().map(|(id, _)| (*id).clone())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_file(&self, name: &str, parent_id: &str, content: Vec<u8>) -> Result<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(name)?;

        let mut entries = self.write();
        match entries.get(parent_id) {
            Some(parent) if parent.is_folder => {}
            Some(_) => return Err(Error::InvalidInput("Parent is a file".to_string())),
            None => return Err(Error::NotFound(format!("Folder not found: {}", parent_id))),
        }

        let id = Uuid::new_v4().to_string();
        entries.insert(
            id.clone(),
            Entry {
                name: name.to_string(),
                parent: Some(parent_id.to_string()),
                is_folder: false,
                data: content,
                modified: Utc::now(),
            },
        );

        Ok(id)
    }

    async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<String> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let name = match self.read().get(file_id) {
            Some(entry) if !entry.is_folder => entry.name.clone(),
            Some(_) => return Err(Error::InvalidInput("Cannot update a folder".to_string())),
            None => return Err(Error::NotFound(format!("File not found: {}", file_id))),
        };
        self.check_failure(&name)?;

        let mut entries = self.write();
        let entry = entries
            .get_mut(file_id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_id)))?;
        entry.data = content;
        entry.modified = Utc::now();

        Ok(file_id.to_string())
    }

    async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        Ok(self.find(name, Some(parent_id), false))
    }

    async fn find_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Option<String>> {
        Ok(self.find(name, parent_id, true))
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut entries = self.write();
        if let Some(parent) = parent_id {
            if !entries.get(parent).map(|e| e.is_folder).unwrap_or(false) {
                return Err(Error::NotFound(format!("Folder not found: {}", parent)));
            }
        }

        let id = Uuid::new_v4().to_string();
        entries.insert(
            id.clone(),
            Entry {
                name: name.to_string(),
                parent: parent_id.map(str::to_string),
                is_folder: true,
                data: Vec::new(),
                modified: Utc::now(),
            },
        );

        Ok(id)
    }
}
