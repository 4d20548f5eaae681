//! DriveKeeper CLI - Command line front end for Google Drive backup.
//!
//! Authenticates with the device flow on first use, then uploads single
//! files or runs the periodic backup loop until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use drivekeeper_backup::{BackupConfig, BackupMode, DriveBackupClient, TracingLogger};

#[derive(Parser)]
#[command(name = "drivekeeper")]
#[command(about = "DriveKeeper - Google Drive upload and periodic backup")]
#[command(version)]
struct Cli {
    /// OAuth client credentials downloaded from the Cloud Console.
    #[arg(long, global = true, default_value = "credentials.json")]
    credentials: PathBuf,

    /// Token file (default: <config dir>/drivekeeper/token.json).
    #[arg(long, global = true)]
    token: Option<PathBuf>,

    /// Drive folder files are stored in.
    #[arg(long, global = true, default_value = "DriveKeeper")]
    folder: String,

    /// Never launch a browser during authorization.
    #[arg(long, global = true)]
    no_browser: bool,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file as a new Drive file.
    Upload {
        /// Local file to upload.
        file: PathBuf,
    },

    /// Replace the content of an existing Drive file with the same name.
    Update {
        /// Local file to upload.
        file: PathBuf,
    },

    /// Update the Drive file with the same name, or create it.
    Push {
        /// Local file to upload.
        file: PathBuf,
    },

    /// Create a folder.
    Mkdir {
        /// Folder name.
        name: String,

        /// Parent folder id (default: Drive root).
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Back up paths periodically until interrupted.
    Backup {
        /// File or directory to back up. Repeatable.
        #[arg(short, long = "path", required = true)]
        paths: Vec<PathBuf>,

        /// Glob matched against file names to skip. Repeatable.
        #[arg(short, long = "exclude")]
        excludes: Vec<String>,

        /// Seconds between passes.
        #[arg(short, long, default_value_t = 3600)]
        interval: u64,

        /// Upload every file on every pass.
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = BackupConfig::new(
        cli.folder.clone(),
        cli.credentials.clone(),
        cli.token.clone().unwrap_or_else(default_token_path),
    )
    .with_browser(!cli.no_browser)
    .with_logger(Arc::new(TracingLogger));

    match cli.command {
        Commands::Upload { file } => cmd_upload(config, &file).await,

        Commands::Update { file } => cmd_update(config, &file).await,

        Commands::Push { file } => cmd_push(config, &file).await,

        Commands::Mkdir { name, parent } => cmd_mkdir(config, &name, parent.as_deref()).await,

        Commands::Backup {
            paths,
            excludes,
            interval,
            full,
        } => {
            let mode = if full {
                BackupMode::Full
            } else {
                BackupMode::Incremental
            };
            let config = config
                .with_backup(Duration::from_secs(interval), paths)
                .with_excludes(excludes)
                .with_mode(mode);
            cmd_backup(config).await
        }
    }
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("drivekeeper").join("token.json"))
        .unwrap_or_else(|| PathBuf::from("token.json"))
}

async fn connect(config: BackupConfig) -> Result<DriveBackupClient> {
    DriveBackupClient::connect(config)
        .await
        .context("Failed to connect to Google Drive")
}

/// Upload a file as a new Drive file.
async fn cmd_upload(config: BackupConfig, file: &Path) -> Result<()> {
    let client = connect(config).await?;

    let file_id = client
        .upload_file(file)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;

    println!("Uploaded: {}", file.display());
    println!("  File ID: {}", file_id);
    Ok(())
}

/// Replace an existing Drive file.
async fn cmd_update(config: BackupConfig, file: &Path) -> Result<()> {
    let client = connect(config).await?;

    let file_id = client
        .update_file(file)
        .await
        .with_context(|| format!("Failed to update {}", file.display()))?;

    println!("Updated: {}", file.display());
    println!("  File ID: {}", file_id);
    Ok(())
}

/// Update or create.
async fn cmd_push(config: BackupConfig, file: &Path) -> Result<()> {
    let client = connect(config).await?;

    let outcome = client
        .upload_or_update(file)
        .await
        .with_context(|| format!("Failed to push {}", file.display()))?;

    let action = if outcome.is_new { "Created" } else { "Updated" };
    println!("{}: {}", action, file.display());
    println!("  File ID: {}", outcome.file_id);
    Ok(())
}

/// Create a folder.
async fn cmd_mkdir(config: BackupConfig, name: &str, parent: Option<&str>) -> Result<()> {
    let client = connect(config).await?;

    let folder_id = client
        .create_folder(name, parent)
        .await
        .context("Failed to create folder")?;

    println!("Folder created: {}", name);
    println!("  Folder ID: {}", folder_id);
    Ok(())
}

/// Run periodic backup until Ctrl-C.
async fn cmd_backup(config: BackupConfig) -> Result<()> {
    let mut client = connect(config).await?;

    client.start_backup().context("Failed to start backup")?;
    info!("Backup running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Stopping backup...");
    let status = client.backup_status();
    client.stop_backup().await;

    if let Some(status) = status {
        let status = status.borrow();
        println!("Passes completed: {}", status.passes_completed);
        if let Some(summary) = status.last_summary {
            println!(
                "  Last pass: {} succeeded, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            );
        }
    }

    Ok(())
}
