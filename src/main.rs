use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zipdrive::engine::{compress_items, extract_archive};
use zipdrive::models::{
    CompressionRequest, ExtractionRequest, FolderId, ItemId, ProgressSnapshot,
};
use zipdrive::remote::{ConflictPolicy, DriveStore};
use zipdrive::system::ArchiveFormat;
use zipdrive::utils::config::Config;
use zipdrive::utils::formatter::{format_file_size, format_snapshot, pluralize};

#[derive(Parser)]
#[command(name = "zipdrive")]
#[command(about = "Extract archives into Drive folders and compress Drive items into archives")]
struct Cli {
    /// Configuration file (default: $ZIPDRIVE_CONFIG, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Uploads in flight at once (overrides the configuration)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download an archive and recreate its contents in a folder
    Extract {
        /// Archive file id
        archive: String,

        /// Destination folder id
        #[arg(long)]
        dest: String,

        /// Extract into a new folder named after the archive
        #[arg(long)]
        subfolder: bool,

        /// keep-both, overwrite or skip
        #[arg(long)]
        conflict: Option<String>,
    },
    /// Pack files and folders into one archive
    Compress {
        /// File or folder ids
        #[arg(required = true)]
        items: Vec<String>,

        /// Destination folder id
        #[arg(long)]
        dest: String,

        /// Archive name (default: Compressed_<timestamp>)
        #[arg(long)]
        name: Option<String>,

        /// zip, tar, tar.gz, tar.zst or 7z
        #[arg(long, default_value = "zip")]
        format: String,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zipdrive=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print snapshots until the job drops its sender
fn spawn_progress_printer(
    mut rx: mpsc::UnboundedReceiver<ProgressSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            println!("{}", format_snapshot(&snapshot));
        }
    })
}

fn install_ctrl_c(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            cancel.store(true, Ordering::Relaxed);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.engine.upload_concurrency = concurrency;
    }
    if let Command::Extract {
        conflict: Some(conflict),
        ..
    } = &cli.command
    {
        config.engine.conflict_policy = ConflictPolicy::parse(conflict)
            .with_context(|| format!("unknown conflict policy '{}'", conflict))?;
    }
    config.validate().context("invalid configuration")?;

    let token = config.access_token()?;
    let store = DriveStore::new(
        &config.drive.api_base,
        token,
        Duration::from_secs(config.drive.request_timeout_secs),
    )
    .context("creating HTTP client")?;

    let cancel = Arc::new(AtomicBool::new(false));
    install_ctrl_c(Arc::clone(&cancel));
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_progress_printer(rx);

    match cli.command {
        Command::Extract {
            archive,
            dest,
            subfolder,
            ..
        } => {
            let request = ExtractionRequest {
                archive: ItemId::new(archive),
                destination: FolderId::new(dest),
                create_subfolder: subfolder,
            };
            let summary = extract_archive(&store, &request, &config.engine, tx, cancel).await;
            let _ = printer.await;
            let summary = summary?;

            if summary.cancelled {
                println!(
                    "Cancelled after {} of {}",
                    summary.uploaded + summary.skipped_existing + summary.failed,
                    pluralize(summary.total_files, "file", "files")
                );
                return Ok(());
            }
            println!(
                "Extracted {} into folder {}",
                pluralize(summary.uploaded, "file", "files"),
                summary.target_root
            );
            if summary.skipped_existing > 0 {
                println!(
                    "Skipped {} that already existed",
                    pluralize(summary.skipped_existing, "file", "files")
                );
            }
            if !summary.rejected_paths.is_empty() {
                println!(
                    "Ignored {} with unsafe paths",
                    pluralize(summary.rejected_paths.len(), "entry", "entries")
                );
            }
            if summary.failed > 0 {
                println!(
                    "Warning: {} could not be uploaded",
                    pluralize(summary.failed, "file", "files")
                );
                for error in &summary.errors {
                    println!("  {}", error);
                }
            }
        }
        Command::Compress {
            items,
            dest,
            name,
            format,
        } => {
            let Some(format) = ArchiveFormat::from_display_name(&format) else {
                bail!("unsupported archive format '{}'", format);
            };
            let request = CompressionRequest {
                sources: items.into_iter().map(ItemId::new).collect(),
                destination: FolderId::new(dest),
                archive_name: name,
                format,
            };
            let summary =
                compress_items(&store, &request, &config.engine, &config.limits, tx, cancel).await;
            let _ = printer.await;
            let summary = summary?;

            if summary.cancelled {
                println!("Cancelled; nothing was uploaded");
                return Ok(());
            }
            if summary.skipped_existing {
                println!(
                    "{} already exists in the destination; nothing was uploaded",
                    summary.archive_name
                );
                return Ok(());
            }
            info!(archive = %summary.archive_name, "done");
            println!(
                "Uploaded {} ({}, {})",
                summary.archive_name,
                pluralize(summary.file_count, "file", "files"),
                format_file_size(summary.archive_bytes)
            );
        }
    }

    Ok(())
}
