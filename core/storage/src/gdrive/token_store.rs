//! Persistent OAuth2 credential storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use drivekeeper_common::{Error, Result};

/// OAuth2 credential with expiration tracking.
///
/// Field names follow the widely used `{access_token, token_type,
/// refresh_token, expiry}` token file layout so existing token files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API requests.
    pub access_token: String,
    /// Token type, normally "Bearer".
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub expiry: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// Check if the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expiry < Utc::now()
    }

    /// Check if the access token is expired or about to expire.
    pub fn needs_refresh(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expiry < Utc::now() + Duration::minutes(5)
    }

    /// Whether a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

/// Loads and saves a [`Credential`] at a fixed path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store for the given token file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - `Serialization` if the file cannot be parsed
    /// - `Authentication` if the token is expired and cannot be refreshed
    pub fn load(&self) -> Result<Credential> {
        let data = fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("Token file not found: {}", self.path.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let credential: Credential = serde_json::from_slice(&data)
            .map_err(|e| Error::Serialization(format!("Invalid token file: {}", e)))?;

        if credential.is_expired() && !credential.can_refresh() {
            return Err(Error::Authentication(
                "Token expired and no refresh token is available".to_string(),
            ));
        }

        Ok(credential)
    }

    /// Persist a credential.
    ///
    /// The data is written to a sibling temporary file, synced, then renamed
    /// over the target so a crash never leaves a truncated token file.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_vec_pretty(credential)
            .map_err(|e| Error::Serialization(format!("Failed to serialize token: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path();
        let result = write_synced(&tmp_path, &json).and_then(|_| fs::rename(&tmp_path, &self.path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io(e));
        }

        tracing::debug!("Saved token to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = open_private(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credential(expiry: DateTime<Utc>, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: refresh.map(str::to_string),
            expiry,
        }
    }

    #[test]
    fn test_credential_expiration() {
        let expired = credential(Utc::now() - Duration::hours(1), None);
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());

        let valid = credential(Utc::now() + Duration::hours(1), None);
        assert!(!valid.is_expired());
        assert!(!valid.needs_refresh());
    }

    #[test]
    fn test_credential_near_expiration() {
        // Expiring in 4 minutes: still usable, but due for refresh
        let token = credential(Utc::now() + Duration::minutes(4), Some("refresh"));
        assert!(!token.is_expired());
        assert!(token.needs_refresh());
    }

    #[test]
    fn test_empty_refresh_token_cannot_refresh() {
        let token = credential(Utc::now(), Some(""));
        assert!(!token.can_refresh());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));
        let token = credential(Utc::now() + Duration::hours(1), Some("refresh"));

        store.save(&token).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, token);
        assert!(!temp.path().join("token.json.tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("nested/dir/token.json"));

        store
            .save(&credential(Utc::now() + Duration::hours(1), None))
            .unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("absent.json"));

        assert!(matches!(store.load(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            TokenStore::new(&path).load(),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_load_expired_without_refresh_token() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));
        store
            .save(&credential(Utc::now() - Duration::hours(1), None))
            .unwrap();

        assert!(matches!(store.load(), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_load_expired_with_refresh_token() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));
        store
            .save(&credential(Utc::now() - Duration::hours(1), Some("refresh")))
            .unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.is_expired());
        assert!(loaded.can_refresh());
    }

    #[test]
    fn test_load_existing_token_file_layout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        fs::write(
            &path,
            r#"{
  "access_token": "ya29.abc",
  "token_type": "Bearer",
  "refresh_token": "1//xyz",
  "expiry": "2024-01-01T10:00:00.123456+08:00"
}"#,
        )
        .unwrap();

        let loaded = TokenStore::new(&path).load().unwrap();
        assert_eq!(loaded.access_token, "ya29.abc");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//xyz"));
    }
}
