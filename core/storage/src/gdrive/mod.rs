//! Google Drive remote storage for DriveKeeper.
//!
//! This module provides:
//! - OAuth2 device-flow authentication with automatic token refresh
//! - A persistent token file
//! - Multipart and chunked/resumable uploads
//! - A [`RemoteStorage`](crate::RemoteStorage) implementation over Drive v3

pub mod auth;
pub mod client;
pub mod token_store;

pub use auth::{
    authenticate, obtain_credential, AppCredentials, AuthManager, Authorizer,
    DeviceAuthorization, TokenManager,
};
pub use client::{DriveClient, DriveFile};
pub use token_store::{Credential, TokenStore};
