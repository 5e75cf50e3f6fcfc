//! # Media Archive - Main Entry Point
//!
//! Archives the current working directory into `./Media-archive`.
//!
//! ## Execution flow:
//! 1. Parse the optional CLI flags (config file, workers, verbose)
//! 2. Configure `tracing` (RUST_LOG wins over `--verbose`)
//! 3. Build the configuration and the archiver for the current directory;
//!    running from inside the archive folder fails here
//! 4. Run; Ctrl-C stops dispatching new files
//!
//! ## Example:
//! ```bash
//! cd ~/Pictures && media-archive --workers 2
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_archive::{ArchiveConfig, MediaArchiver};

#[derive(Parser)]
#[command(name = "media-archive")]
#[command(about = "Mirror the current directory into a browsable archive of thumbnails and video proxies")]
struct Args {
    /// JSON configuration file (missing fields use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match args.config {
        Some(ref path) => ArchiveConfig::from_file(path).await?,
        None => ArchiveConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let working_root = std::env::current_dir()?;
    let archiver = MediaArchiver::new(&working_root, config)?;

    let cancel = archiver.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            cancel.cancel();
        }
    });

    let summary = archiver.run().await?;
    info!("Processing completed: {}", summary);

    Ok(())
}
