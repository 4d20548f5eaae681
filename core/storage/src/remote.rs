//! Remote storage gateway trait definition.

use async_trait::async_trait;

use drivekeeper_common::Result;

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Operations the backup core needs from a remote file store.
///
/// Objects are addressed by opaque provider ids. A `None` parent means the
/// root of the store. Implementations handle their own authentication and
/// must surface every failure; callers decide how to isolate them.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Get the provider name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Create a new file named `name` inside `parent_id`.
    ///
    /// # Postconditions
    /// - A new remote object exists even if one with the same name was
    ///   already present
    /// - Returns the id of the created object
    async fn create_file(&self, name: &str, parent_id: &str, content: Vec<u8>) -> Result<String>;

    /// Replace the content of an existing file.
    ///
    /// # Errors
    /// - File not found
    /// - Network/authentication errors
    async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<String>;

    /// Find a non-folder object by exact name inside `parent_id`.
    async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<String>>;

    /// Find a folder by exact name, optionally restricted to a parent.
    async fn find_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Option<String>>;

    /// Create a folder.
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String>;
}
