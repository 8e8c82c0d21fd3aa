//! dirship upload CLI entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirship_uploader::{DEFAULT_CHUNK_SIZE, UploadConfig, upload};

/// Moves a local directory to a remote dirship receiver.
#[derive(Debug, Parser)]
#[command(name = "dirship", version, about)]
struct Args {
    /// Receiver host.
    host: String,

    /// Local directory to upload.
    source_dir: PathBuf,

    /// Receiver port.
    #[arg(short, long, env = "DIRSHIP_PORT", default_value_t = 9360)]
    port: u16,

    /// Name of the remote directory the upload replaces.
    #[arg(short, long, env = "DIRSHIP_TARGET", default_value = "home")]
    target_name: String,

    /// Streaming block size in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Keep the local source directory after a successful upload.
    #[arg(long)]
    keep_source: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = UploadConfig::new(args.host, args.port, args.target_name);
    config.chunk_size = args.chunk_size;
    config.delete_source = !args.keep_source;

    let report = upload(&args.source_dir, &config).await?;

    tracing::info!(
        bytes_sent = report.bytes_sent,
        elapsed_secs = report.elapsed.as_secs_f64(),
        source_deleted = report.source_deleted,
        "upload complete"
    );
    Ok(())
}
