//! Periodic backup scheduling.
//!
//! A [`BackupRunner`] performs one pass: discover, filter, detect changes,
//! upload. A [`BackupScheduler`] drives a runner from a background task,
//! once immediately and then once per interval, until it is stopped.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use drivekeeper_common::{Error, Result};

use crate::config::{BackupConfig, BackupMode};
use crate::discovery::discover_files;
use crate::filter::ExclusionRules;
use crate::logger::BackupLogger;
use crate::record::BackupRecord;
use crate::uploader::FolderUploader;

/// Counts for one backup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Files found after exclusion filtering.
    pub discovered: usize,
    /// Files uploaded or updated.
    pub succeeded: usize,
    /// Files that could not be checked or uploaded.
    pub failed: usize,
    /// Successful uploads that created a remote file.
    pub created: usize,
    /// Successful uploads that replaced a remote file.
    pub updated: usize,
    /// Files unchanged since their last backup.
    pub skipped: usize,
}

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick, or not started yet.
    Idle,
    /// A pass is in progress.
    Running,
    /// The loop has exited. Terminal.
    Stopped,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub passes_completed: u64,
    pub last_summary: Option<PassSummary>,
}

/// Executes backup passes and owns the record of what was backed up.
pub struct BackupRunner {
    targets: Vec<PathBuf>,
    rules: ExclusionRules,
    mode: BackupMode,
    record: BackupRecord,
    uploader: FolderUploader,
    logger: Arc<dyn BackupLogger>,
}

impl BackupRunner {
    /// Create a runner for the backup settings in `config`.
    pub fn new(config: &BackupConfig, uploader: FolderUploader) -> Self {
        // Record keys are absolute paths
        let targets = config
            .backup_paths
            .iter()
            .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect();

        Self {
            targets,
            rules: ExclusionRules::new(&config.backup_excludes),
            mode: config.mode,
            record: BackupRecord::new(),
            uploader,
            logger: config.logger(),
        }
    }

    /// What has been backed up so far.
    pub fn record(&self) -> &BackupRecord {
        &self.record
    }

    /// Run one pass over all targets.
    ///
    /// Per-file failures are logged and counted, never returned; a failed
    /// file keeps its previous record so the next pass retries it.
    pub async fn run_pass(&mut self) -> PassSummary {
        self.logger.info(format_args!("Starting backup pass"));

        let files = discover_files(&self.targets, &self.rules, self.logger.as_ref());
        let mut summary = PassSummary {
            discovered: files.len(),
            ..PassSummary::default()
        };

        if files.is_empty() {
            self.logger.info(format_args!("No files to back up"));
            return summary;
        }

        for file in &files {
            let modified = match modified_time(file).await {
                Ok(t) => t,
                Err(e) => {
                    self.logger.warning(format_args!(
                        "Cannot access file {}: {}",
                        file.display(),
                        e
                    ));
                    summary.failed += 1;
                    continue;
                }
            };

            if !self.record.needs_backup(file, modified, self.mode) {
                summary.skipped += 1;
                continue;
            }

            match self.uploader.upload_or_update(file).await {
                Ok(outcome) => {
                    self.record.mark_backed_up(file, modified);
                    summary.succeeded += 1;
                    if outcome.is_new {
                        summary.created += 1;
                        self.logger.info(format_args!("Created: {}", file.display()));
                    } else {
                        summary.updated += 1;
                        self.logger.info(format_args!("Updated: {}", file.display()));
                    }
                }
                Err(e) => {
                    self.logger.error(format_args!(
                        "Backup failed for {}: {}",
                        file.display(),
                        e
                    ));
                    summary.failed += 1;
                }
            }
        }

        self.logger.info(format_args!(
            "Backup pass complete: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        ));

        summary
    }
}

async fn modified_time(path: &Path) -> std::io::Result<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(metadata.modified()?.into())
}

/// Background task running a [`BackupRunner`] on a fixed interval.
///
/// `start` and `stop` take `&mut self`; the scheduler is meant to be driven
/// by a single owner.
pub struct BackupScheduler {
    interval: Duration,
    runner: Option<BackupRunner>,
    status_tx: Option<watch::Sender<SchedulerStatus>>,
    status_rx: watch::Receiver<SchedulerStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    logger: Arc<dyn BackupLogger>,
}

impl BackupScheduler {
    /// Create a scheduler for the backup settings in `config`.
    ///
    /// # Errors
    /// - `InvalidConfig` if the backup interval is zero
    pub fn new(config: &BackupConfig, uploader: FolderUploader) -> Result<Self> {
        if config.backup_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "backup interval must be greater than zero".to_string(),
            ));
        }

        let (status_tx, status_rx) = watch::channel(SchedulerStatus {
            state: SchedulerState::Idle,
            passes_completed: 0,
            last_summary: None,
        });

        Ok(Self {
            interval: config.backup_interval,
            runner: Some(BackupRunner::new(config, uploader)),
            status_tx: Some(status_tx),
            status_rx,
            cancel: CancellationToken::new(),
            task: None,
            logger: config.logger(),
        })
    }

    /// Spawn the backup loop on the current tokio runtime.
    ///
    /// The first pass starts immediately; later passes follow every
    /// interval. Returns without waiting for any pass.
    ///
    /// # Errors
    /// - `AlreadyRunning` if this scheduler was started before
    pub fn start(&mut self) -> Result<()> {
        let (Some(runner), Some(status_tx)) = (self.runner.take(), self.status_tx.take()) else {
            return Err(Error::AlreadyRunning);
        };

        let period = self.interval;
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(run_loop(runner, period, cancel, status_tx)));

        self.logger
            .info(format_args!("Periodic backup started, interval: {:?}", period));
        Ok(())
    }

    /// Stop the loop, waiting for an in-flight pass to finish.
    ///
    /// Does nothing if the scheduler is not running.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        self.cancel.cancel();
        if let Err(e) = task.await {
            tracing::error!("Backup task ended abnormally: {}", e);
        }

        self.logger.info(format_args!("Periodic backup stopped"));
    }

    /// Whether the loop is active.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        self.status_rx.borrow().state
    }

    /// Receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_rx.clone()
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop(
    mut runner: BackupRunner,
    period: Duration,
    cancel: CancellationToken,
    status: watch::Sender<SchedulerStatus>,
) {
    // A slow pass delays the next tick instead of queueing extra passes
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    run_and_publish(&mut runner, &status).await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => run_and_publish(&mut runner, &status).await,
        }
    }

    status.send_modify(|s| s.state = SchedulerState::Stopped);
    tracing::debug!("Backup loop exited");
}

async fn run_and_publish(runner: &mut BackupRunner, status: &watch::Sender<SchedulerStatus>) {
    status.send_modify(|s| s.state = SchedulerState::Running);

    let summary = runner.run_pass().await;

    status.send_modify(|s| {
        s.state = SchedulerState::Idle;
        s.passes_completed += 1;
        s.last_summary = Some(summary);
    });
}
