//! dirship receiver daemon entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirship_receiver::{ReceiverConfig, ReceiverServer};

/// Receives directory uploads and swaps them into place.
#[derive(Debug, Parser)]
#[command(name = "dirshipd", version, about)]
struct Args {
    /// TCP port to listen on.
    #[arg(short, long, env = "DIRSHIP_PORT", default_value_t = 9360)]
    port: u16,

    /// Working root directory for uploads and installed trees.
    #[arg(short, long, env = "DIRSHIP_HOME", default_value = "dirship-home")]
    root: PathBuf,
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
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        root = %args.root.display(),
        "starting dirshipd"
    );

    let server = ReceiverServer::new(ReceiverConfig {
        port: args.port,
        working_root: args.root,
    });

    let shutdown = {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                server.shutdown();
            }
        })
    };

    server.run().await?;
    shutdown.abort();

    tracing::info!("dirshipd shut down cleanly");
    Ok(())
}
