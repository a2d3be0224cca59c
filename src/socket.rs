//! Datagram transport abstraction.
//!
//! [`Datagram`] is the raw send/receive contract, implemented here for
//! `tokio::net::UdpSocket` and in [`crate::simulator`] for a fault-injecting
//! wrapper.  [`Socket`] sits on top and speaks frames: it encodes outbound
//! [`Packet`]s and turns each inbound datagram into a [`Decoded`] frame or
//! an explicit [`RecvError`].  All protocol logic lives elsewhere.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::error::TransferError;
use crate::packet::{self, Decoded, Packet, FRAME_LEN};

// ---------------------------------------------------------------------------
// Datagram
// ---------------------------------------------------------------------------

/// Unreliable, unordered datagram I/O.
#[async_trait]
pub trait Datagram: Send + Sync {
    /// Send `buf` as one datagram to `dest`.
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize>;

    /// Wait for the next datagram, copying at most `buf.len()` bytes.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Datagram for UdpSocket {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Outcome of a receive that did not yield a usable frame.
///
/// Only [`RecvError::Io`] is fatal; the other two are part of normal
/// operation over a lossy link.
#[derive(Debug, Error)]
pub enum RecvError {
    /// Nothing arrived within the allotted time.
    #[error("receive timed out")]
    Timeout,
    /// A datagram arrived but failed checksum verification.
    #[error("corrupt frame (claimed seq {seq})")]
    Corrupt { seq: i32 },
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// A frame-oriented datagram socket.
///
/// All methods are `&self`, so the socket can be shared across tasks if needed.
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: Box<dyn Datagram>,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Socket {
    /// Bind a new UDP socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        Self::from_datagram(inner)
    }

    /// Wrap any [`Datagram`] implementation, e.g. a simulator.
    pub fn from_datagram(inner: impl Datagram + 'static) -> io::Result<Self> {
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner: Box::new(inner),
        })
    }

    /// Encode `packet` and send it as a single frame to `dest`.
    pub async fn send_packet(
        &self,
        packet: &Packet,
        dest: SocketAddr,
    ) -> Result<(), TransferError> {
        let frame = packet.encode()?;
        self.inner.send_to(&frame, dest).await?;
        Ok(())
    }

    /// Send unframed bytes (the filename request).
    pub async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Wait for the next datagram without interpreting it.
    pub async fn recv_raw(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; FRAME_LEN];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }

    /// Receive and decode the next datagram, corrupt or not.
    ///
    /// `None` waits indefinitely.  Never returns [`RecvError::Corrupt`];
    /// check [`Decoded::corrupt`] instead.
    pub async fn recv_decoded(
        &self,
        wait: Option<Duration>,
    ) -> Result<(Decoded, SocketAddr), RecvError> {
        let mut buf = [0u8; FRAME_LEN];
        let (n, addr) = match wait {
            Some(limit) => tokio::time::timeout(limit, self.inner.recv_from(&mut buf))
                .await
                .map_err(|_elapsed| RecvError::Timeout)??,
            None => self.inner.recv_from(&mut buf).await?,
        };
        Ok((packet::decode(&buf[..n]), addr))
    }

    /// Receive and verify the next frame.
    ///
    /// Corrupt frames are reported as [`RecvError::Corrupt`] rather than
    /// returned.
    pub async fn recv_frame(
        &self,
        wait: Option<Duration>,
    ) -> Result<(Decoded, SocketAddr), RecvError> {
        let (frame, addr) = self.recv_decoded(wait).await?;
        if frame.corrupt {
            return Err(RecvError::Corrupt { seq: frame.seq });
        }
        Ok((frame, addr))
    }
}
