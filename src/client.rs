//! Fetching side: request a file and write it to local storage.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::error::TransferError;
use crate::receiver::{ReceiveReport, Receiver};
use crate::socket::Socket;

/// Bind `bind`, fetch `filename` from `server`, and store it at `output`
/// (defaults to [`default_output`]).
pub async fn run(
    server: SocketAddr,
    bind: SocketAddr,
    filename: &str,
    output: Option<PathBuf>,
) -> Result<ReceiveReport, TransferError> {
    let socket = Socket::bind(bind).await?;
    let output = output.unwrap_or_else(|| default_output(filename));
    fetch(socket, server, filename, &output).await
}

/// Fetch over an already bound socket.
///
/// The destination is created (or truncated) before the request goes out.
pub async fn fetch(
    socket: Socket,
    server: SocketAddr,
    filename: &str,
    output: &Path,
) -> Result<ReceiveReport, TransferError> {
    let file = File::create(output).await?;
    log::info!("[client] writing to {}", output.display());

    let (report, _file) = Receiver::new(socket, server, file).run(filename).await?;
    Ok(report)
}

/// `my-<name>` in the working directory, using only the last path component.
pub fn default_output(filename: &str) -> PathBuf {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    PathBuf::from(format!("my-{base}"))
}
