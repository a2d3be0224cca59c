//! Serving side: wait for a filename request, then send that file.
//!
//! One call to [`serve`] handles exactly one transfer, the same way the
//! protocol has no notion of sessions: the first non-empty datagram names
//! the file and its source address becomes the peer.

use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio::io::BufReader;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::sender::{Sender, TransferReport};
use crate::socket::Socket;

/// Bind `bind` and serve one file from under `root`.
pub async fn run(
    bind: SocketAddr,
    root: &Path,
    config: TransferConfig,
) -> Result<TransferReport, TransferError> {
    let socket = Socket::bind(bind).await?;
    log::info!("[server] waiting for a request on {}", socket.local_addr);
    serve(socket, root, config).await
}

/// Serve one file over an already bound socket.
///
/// A missing or unreadable file is fatal before any frame is sent.
pub async fn serve(
    socket: Socket,
    root: &Path,
    config: TransferConfig,
) -> Result<TransferReport, TransferError> {
    let (name, peer) = await_request(&socket).await?;
    log::info!("[server] ← REQUEST {name:?} from {peer}");

    let path = resolve(root, &name)?;
    let (file, len) = open_source(&path).await?;
    log::info!("[server] file {} is {len} bytes", path.display());

    Sender::new(socket, peer, BufReader::new(file), len, config)?
        .run()
        .await
}

/// Wait for the first non-empty filename request.
async fn await_request(socket: &Socket) -> Result<(String, SocketAddr), TransferError> {
    loop {
        let (bytes, peer) = socket.recv_raw().await?;
        let name = parse_request(&bytes);
        if !name.is_empty() {
            return Ok((name, peer));
        }
        log::debug!("[server] ignoring empty request from {peer}");
    }
}

/// Interpret a request datagram as a filename.
///
/// Invalid UTF-8 is replaced lossily; surrounding whitespace and NUL padding
/// are trimmed.
pub fn parse_request(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Map a requested name onto a path under `root`.
///
/// Absolute paths and any `..` component are refused.
pub fn resolve(root: &Path, name: &str) -> Result<PathBuf, TransferError> {
    let requested = Path::new(name);
    let confined = requested
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if requested.is_absolute() || !confined {
        return Err(TransferError::InvalidRequest(name.to_string()));
    }
    Ok(root.join(requested))
}

async fn open_source(path: &Path) -> Result<(File, u64), TransferError> {
    let unavailable = |source: io::Error| TransferError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(unavailable)?;
    let meta = file.metadata().await.map_err(unavailable)?;
    if !meta.is_file() {
        return Err(unavailable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    Ok((file, meta.len()))
}
