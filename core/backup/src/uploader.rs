//! Upload local files into the target folder.

use std::path::Path;
use std::sync::Arc;

use drivekeeper_common::{Error, Result};
use drivekeeper_storage::RemoteStorage;

/// Result of an upload-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Remote id of the file.
    pub file_id: String,
    /// `true` if the file was created, `false` if an existing one was updated.
    pub is_new: bool,
}

/// Uploads files by base name into one remote folder.
#[derive(Clone)]
pub struct FolderUploader {
    storage: Arc<dyn RemoteStorage>,
    folder_id: String,
}

impl FolderUploader {
    /// Create an uploader for `folder_id`.
    pub fn new(storage: Arc<dyn RemoteStorage>, folder_id: impl Into<String>) -> Self {
        Self {
            storage,
            folder_id: folder_id.into(),
        }
    }

    /// Target folder id.
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Underlying gateway.
    pub fn storage(&self) -> &Arc<dyn RemoteStorage> {
        &self.storage
    }

    /// Create a new remote file from `local_path`, even if one with the
    /// same name already exists.
    pub async fn upload(&self, local_path: &Path) -> Result<String> {
        let name = file_name(local_path)?;
        let content = tokio::fs::read(local_path).await?;

        self.storage
            .create_file(name, &self.folder_id, content)
            .await
    }

    /// Overwrite the remote file with the same name as `local_path`.
    ///
    /// # Errors
    /// - `NotFound` if no remote file has that name
    pub async fn update(&self, local_path: &Path) -> Result<String> {
        let name = file_name(local_path)?;
        let file_id = self
            .storage
            .find_file(name, &self.folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Remote file not found: {}", name)))?;

        let content = tokio::fs::read(local_path).await?;
        self.storage.update_file(&file_id, content).await
    }

    /// Update the remote file with the same name, or create it.
    ///
    /// A failed lookup is an error; it is never taken to mean "absent".
    pub async fn upload_or_update(&self, local_path: &Path) -> Result<UploadOutcome> {
        let name = file_name(local_path)?;
        let existing = self.storage.find_file(name, &self.folder_id).await?;
        let content = tokio::fs::read(local_path).await?;

        match existing {
            Some(file_id) => {
                let file_id = self.storage.update_file(&file_id, content).await?;
                Ok(UploadOutcome {
                    file_id,
                    is_new: false,
                })
            }
            None => {
                let file_id = self
                    .storage
                    .create_file(name, &self.folder_id, content)
                    .await?;
                Ok(UploadOutcome {
                    file_id,
                    is_new: true,
                })
            }
        }
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Unsupported file name: {}", path.display())))
}
