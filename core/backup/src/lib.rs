//! Periodic Google Drive backup for DriveKeeper.
//!
//! [`DriveBackupClient`] binds a remote gateway to one target folder and
//! exposes upload, update and update-or-create on it. With backup enabled it
//! also runs a [`BackupScheduler`] that walks the configured paths on an
//! interval and uploads what changed.
//!
//! # Pass semantics
//! - Files are processed one at a time, in discovery order
//! - A failure on one file never stops the pass; the file is retried next time
//! - The record of what was backed up lives in memory only

pub mod client;
pub mod config;
pub mod discovery;
pub mod filter;
pub mod logger;
pub mod record;
pub mod scheduler;
pub mod uploader;

pub use client::DriveBackupClient;
pub use config::{BackupConfig, BackupMode};
pub use filter::ExclusionRules;
pub use logger::{BackupLogger, StdoutLogger, TracingLogger};
pub use record::BackupRecord;
pub use scheduler::{BackupRunner, BackupScheduler, PassSummary, SchedulerState, SchedulerStatus};
pub use uploader::{FolderUploader, UploadOutcome};
