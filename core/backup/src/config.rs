//! Client and backup configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drivekeeper_common::{Error, Result};

use crate::logger::{BackupLogger, StdoutLogger};

/// Which files a backup pass uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Only files never backed up or modified since their last backup.
    #[default]
    Incremental,
    /// Every discovered file, on every pass.
    Full,
}

/// Google Drive client configuration, including periodic backup settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Master switch for the module.
    pub enabled: bool,
    /// Name of the Drive folder files are stored in.
    pub folder_name: String,
    /// OAuth client descriptor downloaded from the Cloud Console.
    pub credentials_file: PathBuf,
    /// Where the access/refresh token is persisted.
    pub token_file: PathBuf,
    /// Whether periodic backup may be started.
    #[serde(default)]
    pub backup_enabled: bool,
    /// Time between backup passes.
    #[serde(default)]
    pub backup_interval: Duration,
    /// Files and directories to back up.
    #[serde(default)]
    pub backup_paths: Vec<PathBuf>,
    /// Glob patterns matched against file base names.
    #[serde(default)]
    pub backup_excludes: Vec<String>,
    /// Full or incremental passes.
    #[serde(default)]
    pub mode: BackupMode,
    /// Whether authorization may launch a browser.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// Logger override; defaults to [`StdoutLogger`].
    #[serde(skip)]
    pub logger: Option<Arc<dyn BackupLogger>>,
}

fn default_open_browser() -> bool {
    true
}

impl BackupConfig {
    /// Create an enabled configuration with backup turned off.
    pub fn new(
        folder_name: impl Into<String>,
        credentials_file: impl Into<PathBuf>,
        token_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            enabled: true,
            folder_name: folder_name.into(),
            credentials_file: credentials_file.into(),
            token_file: token_file.into(),
            backup_enabled: false,
            backup_interval: Duration::ZERO,
            backup_paths: Vec::new(),
            backup_excludes: Vec::new(),
            mode: BackupMode::Incremental,
            open_browser: true,
            logger: None,
        }
    }

    /// Enable periodic backup of `paths` every `interval`.
    pub fn with_backup(mut self, interval: Duration, paths: Vec<PathBuf>) -> Self {
        self.backup_enabled = true;
        self.backup_interval = interval;
        self.backup_paths = paths;
        self
    }

    /// Set exclusion patterns.
    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.backup_excludes = patterns;
        self
    }

    /// Set the backup mode.
    pub fn with_mode(mut self, mode: BackupMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable launching a browser.
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Set a custom logger.
    pub fn with_logger(mut self, logger: Arc<dyn BackupLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configured logger, or the stdout default.
    pub fn logger(&self) -> Arc<dyn BackupLogger> {
        self.logger
            .clone()
            .unwrap_or_else(|| Arc::new(StdoutLogger))
    }

    /// Check the configuration before a client is built.
    ///
    /// # Errors
    /// - Module disabled
    /// - Empty credentials file, token file or folder name
    /// - Backup enabled with a zero interval or no paths
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Err(Error::InvalidConfig("Google Drive module is disabled".to_string()));
        }
        if self.credentials_file.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "credentials file path must not be empty".to_string(),
            ));
        }
        if self.token_file.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "token file path must not be empty".to_string(),
            ));
        }
        if self.folder_name.is_empty() {
            return Err(Error::InvalidConfig("folder name must not be empty".to_string()));
        }
        if self.backup_enabled {
            if self.backup_interval.is_zero() {
                return Err(Error::InvalidConfig(
                    "backup interval must be greater than zero".to_string(),
                ));
            }
            if self.backup_paths.is_empty() {
                return Err(Error::InvalidConfig(
                    "at least one backup path is required".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("enabled", &self.enabled)
            .field("folder_name", &self.folder_name)
            .field("credentials_file", &self.credentials_file)
            .field("token_file", &self.token_file)
            .field("backup_enabled", &self.backup_enabled)
            .field("backup_interval", &self.backup_interval)
            .field("backup_paths", &self.backup_paths)
            .field("backup_excludes", &self.backup_excludes)
            .field("mode", &self.mode)
            .field("open_browser", &self.open_browser)
            .field("logger", &self.logger.as_ref().map(|_| "custom"))
            .finish()
    }
}
