//! Remote storage access for DriveKeeper.
//!
//! This module provides a trait-based gateway to a cloud file store, the
//! Google Drive implementation with its authentication, and an in-memory
//! store for tests.
//!
//! # Design Principles
//! - Id-addressed operations: callers hold remote ids, never remote paths
//! - Async operations: All I/O operations are async
//! - Unified error semantics: Consistent error types across implementations

pub mod gdrive;
pub mod memory;
pub mod remote;

pub use memory::MemoryStorage;
pub use remote::{RemoteStorage, FOLDER_MIME_TYPE};
