//! Google Drive backup client.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use drivekeeper_common::{Error, Result};
use drivekeeper_storage::gdrive::{authenticate, DriveClient, TokenStore};
use drivekeeper_storage::RemoteStorage;

use crate::config::BackupConfig;
use crate::logger::BackupLogger;
use crate::scheduler::{BackupScheduler, SchedulerStatus};
use crate::uploader::{FolderUploader, UploadOutcome};

/// Drive client bound to one target folder, with optional periodic backup.
pub struct DriveBackupClient {
    config: BackupConfig,
    uploader: FolderUploader,
    scheduler: Option<BackupScheduler>,
    logger: Arc<dyn BackupLogger>,
}

impl DriveBackupClient {
    /// Validate `config`, authenticate against Google, and resolve the
    /// target folder.
    ///
    /// May block on the device authorization flow when no usable token is
    /// stored.
    pub async fn connect(config: BackupConfig) -> Result<Self> {
        config.validate()?;

        let token_manager = authenticate(
            &config.credentials_file,
            TokenStore::new(&config.token_file),
            config.open_browser,
        )
        .await?;
        let drive = DriveClient::new(Arc::new(token_manager))?;

        Self::init(config, Arc::new(drive)).await
    }

    /// Build a client over an existing gateway, skipping authentication.
    pub async fn with_storage(config: BackupConfig, storage: Arc<dyn RemoteStorage>) -> Result<Self> {
        config.validate()?;
        Self::init(config, storage).await
    }

    async fn init(config: BackupConfig, storage: Arc<dyn RemoteStorage>) -> Result<Self> {
        let logger = config.logger();
        let folder_id = resolve_folder(storage.as_ref(), &config.folder_name, logger.as_ref()).await?;

        tracing::debug!(
            "Drive client ready on {} (folder {})",
            storage.name(),
            folder_id
        );

        Ok(Self {
            uploader: FolderUploader::new(storage, folder_id),
            config,
            scheduler: None,
            logger,
        })
    }

    /// Id of the target folder.
    pub fn folder_id(&self) -> &str {
        self.uploader.folder_id()
    }

    /// Active configuration.
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Upload `path` as a new file in the target folder.
    pub async fn upload_file(&self, path: &Path) -> Result<String> {
        let file_id = self.uploader.upload(path).await?;
        self.logger
            .info(format_args!("Uploaded {} ({})", path.display(), file_id));
        Ok(file_id)
    }

    /// Replace the content of the remote file named like `path`.
    pub async fn update_file(&self, path: &Path) -> Result<String> {
        let file_id = self.uploader.update(path).await?;
        self.logger
            .info(format_args!("Updated {} ({})", path.display(), file_id));
        Ok(file_id)
    }

    /// Update the remote file named like `path`, or create it.
    pub async fn upload_or_update(&self, path: &Path) -> Result<UploadOutcome> {
        self.uploader.upload_or_update(path).await
    }

    /// Create a folder under `parent_id`, or under the Drive root.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let folder_id = self.uploader.storage().create_folder(name, parent_id).await?;
        self.logger
            .info(format_args!("Created folder {} ({})", name, folder_id));
        Ok(folder_id)
    }

    /// Start periodic backup with a fresh record.
    ///
    /// # Errors
    /// - `InvalidConfig` if backup is not enabled in the configuration
    /// - `AlreadyRunning` if a backup scheduler is active
    pub fn start_backup(&mut self) -> Result<()> {
        if !self.config.backup_enabled {
            return Err(Error::InvalidConfig(
                "Periodic backup is not enabled".to_string(),
            ));
        }
        if self.scheduler.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let mut scheduler = BackupScheduler::new(&self.config, self.uploader.clone())?;
        scheduler.start()?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stop periodic backup, waiting for an in-flight pass.
    pub async fn stop_backup(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
    }

    /// Whether periodic backup is active.
    pub fn is_backup_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Status updates of the active scheduler.
    pub fn backup_status(&self) -> Option<watch::Receiver<SchedulerStatus>> {
        self.scheduler.as_ref().map(BackupScheduler::subscribe)
    }
}

/// Find the named folder under the Drive root, creating it if absent.
async fn resolve_folder(
    storage: &dyn RemoteStorage,
    name: &str,
    logger: &dyn BackupLogger,
) -> Result<String> {
    if let Some(folder_id) = storage.find_folder(name, None).await? {
        logger.info(format_args!("Using existing folder: {}", name));
        return Ok(folder_id);
    }

    let folder_id = storage.create_folder(name, None).await?;
    logger.info(format_args!("Created folder: {}", name));
    Ok(folder_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::CapturingLogger;
    use crate::scheduler::SchedulerState;
    use drivekeeper_storage::MemoryStorage;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> BackupConfig {
        BackupConfig::new(
            "Backups",
            temp.path().join("credentials.json"),
            temp.path().join("token.json"),
        )
        .with_browser(false)
        .with_logger(Arc::new(CapturingLogger::default()))
    }

    fn write(temp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_connect_without_credentials_file() {
        let temp = TempDir::new().unwrap();

        let result = DriveBackupClient::connect(config(&temp)).await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert!(!temp.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let config = config(&temp).with_backup(Duration::ZERO, vec![temp.path().to_path_buf()]);

        let result = DriveBackupClient::with_storage(config, storage.clone()).await;

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(storage.folder_count(), 0);
    }

    #[tokio::test]
    async fn test_folder_is_created_once() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());

        let first = DriveBackupClient::with_storage(config(&temp), storage.clone())
            .await
            .unwrap();
        let second = DriveBackupClient::with_storage(config(&temp), storage.clone())
            .await
            .unwrap();

        assert_eq!(first.folder_id(), second.folder_id());
        assert_eq!(storage.folder_count(), 1);
    }

    #[tokio::test]
    async fn test_file_operations() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let client = DriveBackupClient::with_storage(config(&temp), storage.clone())
            .await
            .unwrap();
        let path = write(&temp, "notes.txt", b"one");

        assert!(matches!(
            client.update_file(&path).await,
            Err(Error::NotFound(_))
        ));

        let created = client.upload_or_update(&path).await.unwrap();
        assert!(created.is_new);

        write(&temp, "notes.txt", b"two");
        let updated_id = client.update_file(&path).await.unwrap();
        assert_eq!(updated_id, created.file_id);
        assert_eq!(
            storage.file_content("notes.txt", client.folder_id()).unwrap(),
            b"two"
        );

        client.upload_file(&path).await.unwrap();
        assert_eq!(storage.file_count(), 2);
    }

    #[tokio::test]
    async fn test_create_nested_folder() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let client = DriveBackupClient::with_storage(config(&temp), storage.clone())
            .await
            .unwrap();

        let child = client
            .create_folder("2024", Some(client.folder_id()))
            .await
            .unwrap();

        assert_eq!(
            storage.find_folder("2024", Some(client.folder_id())).await.unwrap(),
            Some(child)
        );
    }

    #[tokio::test]
    async fn test_start_backup_requires_backup_enabled() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let mut client = DriveBackupClient::with_storage(config(&temp), storage)
            .await
            .unwrap();

        assert!(matches!(client.start_backup(), Err(Error::InvalidConfig(_))));
        assert!(client.backup_status().is_none());
    }

    #[tokio::test]
    async fn test_backup_lifecycle() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("a.txt"), b"alpha").unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let config = config(&temp).with_backup(Duration::from_secs(3600), vec![data]);
        let mut client = DriveBackupClient::with_storage(config, storage.clone())
            .await
            .unwrap();

        client.start_backup().unwrap();
        assert!(matches!(client.start_backup(), Err(Error::AlreadyRunning)));

        let mut status = client.backup_status().unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| s.passes_completed >= 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(storage.file_content("a.txt", client.folder_id()).unwrap(), b"alpha");

        client.stop_backup().await;
        assert!(!client.is_backup_running());
        assert_eq!(status.borrow().state, SchedulerState::Stopped);

        // A new scheduler starts from an empty record
        client.start_backup().unwrap();
        client.stop_backup().await;
        client.stop_backup().await;
        assert!(storage.update_calls() >= 1);
    }
}
