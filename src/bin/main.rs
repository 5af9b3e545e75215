//! mjpeg-hub server binary
//!
//! Usage: mjpeg-hub -c mjpeg-hub.yaml [--bind 127.0.0.1:8080]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mjpeg_hub::{FileConfig, HubServer};

#[derive(Parser)]
#[command(
    name = "mjpeg-hub",
    about = "Relay ffmpeg MJPEG feeds to many HTTP viewers"
)]
struct Args {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,

    /// Override the listen address from the config file (host:port)
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file = FileConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(file.verbosity))),
        )
        .init();

    let (mut config, channels) = file.into_parts().context("invalid configuration")?;
    if let Some(addr) = args.bind {
        config = config.bind(addr);
    }

    let server = HubServer::new(config, channels).context("failed to set up channels")?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("server error")?;

    Ok(())
}

fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "info,mjpeg_hub=debug,tower_http=debug",
        _ => "info,mjpeg_hub=trace,tower_http=trace",
    }
}
