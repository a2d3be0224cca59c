//! Crate-wide error type for transfers.

use std::path::PathBuf;

use thiserror::Error;

use crate::packet::PacketError;

/// Fatal transfer failures.
///
/// Corruption and timeouts never show up here; the protocol absorbs them
/// (see [`crate::socket::RecvError`]).
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open source file {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file of {0} bytes is too large to announce")]
    FileTooLarge(u64),

    #[error("invalid file request: {0}")]
    InvalidRequest(String),

    #[error("frame error: {0}")]
    Packet(#[from] PacketError),
}
