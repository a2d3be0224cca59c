//! Entry point for `udp-window-ftp`.
//!
//! Parses CLI arguments and dispatches into either **serve** or **fetch** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, address resolution).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;

use udp_window_ftp::{client, server, TransferConfig};

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Wait for one request and send the named file.
    Serve {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: String,
        /// Directory requested names are resolved against.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Per-receive ack timeout in milliseconds.
        #[arg(long, default_value_t = 10)]
        timeout_ms: u64,
        /// Receive attempts per round.
        #[arg(long, default_value_t = 5)]
        acks_per_round: usize,
    },
    /// Request a file from a server and save it locally.
    Fetch {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: String,
        /// Name of the file to request.
        #[arg(short, long)]
        file: String,
        /// Where to write it; defaults to `my-<file>`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: String,
    },
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("resolving {addr}"))?
        .next()
        .with_context(|| format!("no address found for {addr}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Serve {
            bind,
            root,
            timeout_ms,
            acks_per_round,
        } => {
            let bind = resolve(&bind).await?;
            let config = TransferConfig::new()
                .with_recv_timeout(Duration::from_millis(timeout_ms))
                .with_acks_per_round(acks_per_round);
            log::info!("Starting server on {bind}, serving {}", root.display());

            let report = server::run(bind, &root, config)
                .await
                .context("transfer failed")?;
            log::info!(
                "Sent {} bytes in {} packets ({} retransmissions)",
                report.total_len,
                report.packets,
                report.retransmissions
            );
        }
        Mode::Fetch {
            server,
            file,
            output,
            bind,
        } => {
            let server = resolve(&server).await?;
            let bind = resolve(&bind).await?;
            log::info!("Requesting {file:?} from {server}");

            let report = client::run(server, bind, &file, output)
                .await
                .with_context(|| format!("fetching {file}"))?;
            log::info!(
                "Received {} bytes ({} duplicate frames)",
                report.total_len,
                report.duplicates
            );
        }
    }
    Ok(())
}
