//! Common error types for DriveKeeper.

use thiserror::Error;

/// Top-level error type for DriveKeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credential descriptor, token or device authorization problem.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote API call failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote side refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A background backup loop is already active.
    #[error("Backup already running")]
    AlreadyRunning,
}

impl Error {
    /// Whether the error came from a missing resource.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(Error::NotFound("x".to_string()).is_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(Error::from(io).is_not_found());
        assert!(!Error::Network("timeout".to_string()).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("folder name must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: folder name must not be empty"
        );
        assert_eq!(Error::AlreadyRunning.to_string(), "Backup already running");
    }
}
