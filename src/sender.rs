//! Sliding-window send side.
//!
//! [`Sender`] streams one source file to one peer.  It owns the
//! [`Window`], the read cursor into the source, and the sequence counter,
//! and walks the [`SenderState`] machine one handler per state:
//!
//! - **Announcing**: send the size announcement (seq −1) and wait one
//!   receive timeout for its checksummed acknowledgment.
//! - **Streaming**: send every unacked slot, collect acks, then either slide
//!   and refill or, once the source is exhausted, move on to draining.
//! - **Draining**: resend and collect until every slot is acked.
//! - **Done**: send the terminator (seq 0) once.  It is not acknowledged.
//!
//! Lost data or lost acks are repaired by the next round, which resends
//! everything still unacknowledged.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::packet::{Packet, FIRST_DATA_SEQ, MAX_PAYLOAD, SEQ_SIZE_ANNOUNCE};
use crate::socket::{RecvError, Socket};
use crate::state::SenderState;
use crate::window::Window;

/// What a completed send did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// File length announced to the receiver.
    pub total_len: u64,
    /// Distinct data packets created.
    pub packets: u32,
    /// Streaming plus draining rounds.
    pub rounds: u64,
    /// Data frames put on the wire, first copies included.
    pub frames_sent: u64,
    /// Data frames sent again after their first transmission.
    pub retransmissions: u64,
    /// Size announcements sent before the handshake completed.
    pub announcements: u64,
    pub elapsed: Duration,
}

/// Send side of one transfer.
pub struct Sender<R> {
    socket: Socket,
    peer: SocketAddr,
    config: TransferConfig,

    source: R,
    /// Announced length, already checked to fit the 4-byte wire field.
    total_len: i32,
    /// Bytes not yet read from `source`.
    remaining: u64,
    /// Set once the last chunk has been read into a slot.
    end_of_stream: bool,
    /// Sequence number for the next packet created.
    next_seq: i32,

    window: Window,
    state: SenderState,
    report: TransferReport,
}

impl<R: AsyncRead + Unpin + Send> Sender<R> {
    /// Prepare to send `total_len` bytes read from `source` to `peer`.
    ///
    /// Fails with [`TransferError::FileTooLarge`] when the length does not
    /// fit the signed 32-bit announcement.
    pub fn new(
        socket: Socket,
        peer: SocketAddr,
        source: R,
        total_len: u64,
        config: TransferConfig,
    ) -> Result<Self, TransferError> {
        let announced =
            i32::try_from(total_len).map_err(|_| TransferError::FileTooLarge(total_len))?;
        Ok(Self {
            socket,
            peer,
            config,
            source,
            total_len: announced,
            remaining: total_len,
            end_of_stream: false,
            next_seq: FIRST_DATA_SEQ,
            window: Window::new(),
            state: SenderState::default(),
            report: TransferReport {
                total_len,
                ..TransferReport::default()
            },
        })
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Drive the state machine to completion.
    pub async fn run(mut self) -> Result<TransferReport, TransferError> {
        let started = Instant::now();
        log::info!(
            "[sender] sending {} bytes to {}",
            self.report.total_len,
            self.peer
        );

        loop {
            let next = match self.state {
                SenderState::Announcing => self.announce().await?,
                SenderState::Streaming => self.stream_round().await?,
                SenderState::Draining => self.drain_round().await?,
                SenderState::Done => {
                    self.finish().await?;
                    break;
                }
            };
            if next != self.state {
                log::debug!("[sender] {} → {}", self.state, next);
            }
            self.state = next;
        }

        self.report.elapsed = started.elapsed();
        let secs = self.report.elapsed.as_secs_f64().max(f64::EPSILON);
        log::info!("[sender] === Send Complete ===");
        log::info!(
            "[sender] {} bytes in {} packets, {} rounds, {} retransmissions",
            self.report.total_len,
            self.report.packets,
            self.report.rounds,
            self.report.retransmissions
        );
        log::info!(
            "[sender] {:.2} s, {:.2} KB/s",
            secs,
            self.report.total_len as f64 / 1024.0 / secs
        );
        Ok(self.report)
    }

    // -----------------------------------------------------------------------
    // State handlers
    // -----------------------------------------------------------------------

    /// One announcement attempt.  Only a valid seq −1 frame from the peer
    /// completes the handshake; anything else means "send it again".
    async fn announce(&mut self) -> Result<SenderState, TransferError> {
        let pkt = Packet::size_announcement(self.total_len);
        self.socket.send_packet(&pkt, self.peer).await?;
        self.report.announcements += 1;
        log::debug!("[sender] → SIZE len={}", self.total_len);

        match self.socket.recv_frame(Some(self.config.recv_timeout)).await {
            Ok((frame, addr)) if addr == self.peer && frame.seq == SEQ_SIZE_ANNOUNCE => {
                log::info!("[sender] ← SIZE ACK; file length confirmed");
                self.fill().await?;
                Ok(SenderState::Streaming)
            }
            Ok((frame, addr)) => {
                log::debug!("[sender] ignoring seq={} from {addr} during handshake", frame.seq);
                Ok(SenderState::Announcing)
            }
            Err(RecvError::Timeout) => Ok(SenderState::Announcing),
            Err(RecvError::Corrupt { seq }) => {
                log::debug!("[sender] ← corrupt reply (seq {seq}) during handshake");
                Ok(SenderState::Announcing)
            }
            Err(RecvError::Io(e)) => Err(e.into()),
        }
    }

    async fn stream_round(&mut self) -> Result<SenderState, TransferError> {
        self.round().await?;
        if self.end_of_stream {
            return Ok(SenderState::Draining);
        }
        let slid = self.slide().await?;
        if slid > 0 {
            log::debug!("[sender] slid {slid} slot(s); window={}", self.window.len());
        }
        Ok(SenderState::Streaming)
    }

    async fn drain_round(&mut self) -> Result<SenderState, TransferError> {
        if self.window.all_acked() {
            return Ok(SenderState::Done);
        }
        self.round().await?;
        Ok(SenderState::Draining)
    }

    async fn finish(&mut self) -> Result<(), TransferError> {
        self.socket.send_packet(&Packet::terminator(), self.peer).await?;
        log::info!("[sender] → FIN; transfer complete");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Send the window, then listen for acknowledgments.
    async fn round(&mut self) -> Result<(), TransferError> {
        self.report.rounds += 1;
        self.send_window().await?;
        self.collect_acks().await?;
        Ok(())
    }

    /// Transmit every slot that is not yet acknowledged.
    async fn send_window(&mut self) -> Result<usize, TransferError> {
        let mut sent = 0;
        for slot in self.window.unacked_mut() {
            self.socket.send_packet(&slot.packet, self.peer).await?;
            slot.tx_count += 1;
            if slot.tx_count > 1 {
                self.report.retransmissions += 1;
            }
            log::debug!(
                "[sender] → DATA seq={} len={} tx={}",
                slot.packet.seq,
                slot.packet.payload.len(),
                slot.tx_count
            );
            sent += 1;
        }
        self.report.frames_sent += sent as u64;
        Ok(sent)
    }

    /// Exactly `acks_per_round` receive attempts.  Every attempt counts,
    /// whether it yields a valid ack, a corrupt frame, or a timeout.
    async fn collect_acks(&mut self) -> Result<usize, TransferError> {
        let mut newly_acked = 0;
        for _ in 0..self.config.acks_per_round {
            match self.socket.recv_frame(Some(self.config.recv_timeout)).await {
                Ok((frame, addr)) if addr == self.peer => {
                    if self.window.mark_acked(frame.seq) {
                        newly_acked += 1;
                        log::debug!("[sender] ← ACK seq={}", frame.seq);
                    } else {
                        log::trace!("[sender] ← stale ACK seq={}", frame.seq);
                    }
                }
                Ok((frame, addr)) => {
                    log::warn!("[sender] ignoring seq={} from unexpected peer {addr}", frame.seq);
                }
                Err(RecvError::Timeout) => {
                    log::trace!("[sender] ack wait timed out");
                }
                Err(RecvError::Corrupt { seq }) => {
                    log::debug!("[sender] ← corrupt frame (seq {seq}) dropped");
                }
                Err(RecvError::Io(e)) => return Err(e.into()),
            }
        }
        Ok(newly_acked)
    }

    /// Fill every free slot from the source.
    async fn fill(&mut self) -> Result<(), TransferError> {
        while self.window.has_room() {
            match self.next_packet().await? {
                Some(pkt) => self.window.push_back(pkt),
                None => break,
            }
        }
        Ok(())
    }

    /// Pop the acknowledged prefix of the window and refill behind it.
    async fn slide(&mut self) -> Result<usize, TransferError> {
        let mut slid = 0;
        while self.window.pop_front_if_acked().is_some() {
            slid += 1;
        }
        self.fill().await?;
        Ok(slid)
    }

    /// Read the next chunk into a fresh data packet, or `None` once the
    /// source is exhausted.
    async fn next_packet(&mut self) -> Result<Option<Packet>, TransferError> {
        if self.remaining == 0 {
            self.end_of_stream = true;
            return Ok(None);
        }

        let len = self.remaining.min(MAX_PAYLOAD as u64) as usize;
        let mut chunk = vec![0u8; len];
        self.source.read_exact(&mut chunk).await?;
        self.remaining -= len as u64;
        if self.remaining == 0 {
            self.end_of_stream = true;
        }

        let pkt = Packet::data(self.next_seq, chunk);
        self.next_seq += 1;
        self.report.packets += 1;
        Ok(Some(pkt))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::window::WINDOW_SIZE;

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    fn fast() -> TransferConfig {
        TransferConfig::default().with_recv_timeout(Duration::from_millis(5))
    }

    fn source(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn sender_for(len: usize) -> (Sender<Cursor<Vec<u8>>>, Socket) {
        let peer = loopback().await;
        let sender = Sender::new(
            loopback().await,
            peer.local_addr,
            Cursor::new(source(len)),
            len as u64,
            fast(),
        )
        .unwrap();
        (sender, peer)
    }

    fn seqs(s: &Sender<Cursor<Vec<u8>>>) -> Vec<i32> {
        s.window().iter().map(|slot| slot.packet.seq).collect()
    }

    #[tokio::test]
    async fn fill_builds_short_final_packet() {
        let (mut s, _peer) = sender_for(5000).await;
        s.fill().await.unwrap();

        assert_eq!(seqs(&s), vec![1, 2, 3, 4, 5]);
        let lens: Vec<usize> = s.window().iter().map(|x| x.packet.payload.len()).collect();
        assert_eq!(lens, vec![1011, 1011, 1011, 1011, 956]);
        assert!(s.end_of_stream);
        assert_eq!(s.remaining, 0);
    }

    #[tokio::test]
    async fn fill_stops_at_window_capacity() {
        let (mut s, _peer) = sender_for(10_000).await;
        s.fill().await.unwrap();

        assert_eq!(s.window().len(), WINDOW_SIZE);
        assert!(!s.end_of_stream);
        assert_eq!(s.remaining, 10_000 - 5 * 1011);
        assert_eq!(s.next_seq, 6);
    }

    #[tokio::test]
    async fn empty_source_creates_no_packets() {
        let (mut s, _peer) = sender_for(0).await;
        s.fill().await.unwrap();

        assert!(s.window().is_empty());
        assert!(s.end_of_stream);
        assert_eq!(s.next_seq, FIRST_DATA_SEQ);
    }

    #[tokio::test]
    async fn exact_multiple_ends_on_full_packet() {
        let (mut s, _peer) = sender_for(2 * 1011).await;
        s.fill().await.unwrap();

        assert_eq!(seqs(&s), vec![1, 2]);
        assert!(s.window().iter().all(|x| x.packet.payload.len() == 1011));
        assert!(s.end_of_stream);
    }

    #[tokio::test]
    async fn slide_refills_behind_acked_prefix() {
        let (mut s, _peer) = sender_for(10_000).await;
        s.fill().await.unwrap();
        s.window.mark_acked(1);
        s.window.mark_acked(2);
        s.window.mark_acked(4);

        let slid = s.slide().await.unwrap();
        assert_eq!(slid, 2);
        assert_eq!(seqs(&s), vec![3, 4, 5, 6, 7]);
        assert!(s.window().len() <= WINDOW_SIZE);

        // Payloads continue the file where the window left off.
        let seventh = &s.window().iter().last().unwrap().packet.payload;
        assert_eq!(&seventh[..], &source(10_000)[6 * 1011..7 * 1011]);
    }

    #[tokio::test]
    async fn slide_blocked_by_unacked_front() {
        let (mut s, _peer) = sender_for(10_000).await;
        s.fill().await.unwrap();
        s.window.mark_acked(2);

        assert_eq!(s.slide().await.unwrap(), 0);
        assert_eq!(seqs(&s), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let peer = loopback().await;
        let res = Sender::new(
            loopback().await,
            peer.local_addr,
            Cursor::new(Vec::new()),
            i32::MAX as u64 + 1,
            fast(),
        );
        assert!(matches!(res, Err(TransferError::FileTooLarge(_))));
    }

    #[tokio::test]
    async fn truncated_source_is_fatal() {
        let peer = loopback().await;
        let mut s = Sender::new(
            loopback().await,
            peer.local_addr,
            Cursor::new(vec![0u8; 100]),
            3000,
            fast(),
        )
        .unwrap();
        assert!(matches!(s.fill().await, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn handshake_requires_matching_ack() {
        let (mut s, peer) = sender_for(3000).await;
        let me = s.socket.local_addr;

        // A valid frame with the wrong sequence does not complete it.
        peer.send_packet(&Packet::ack(4), me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(s.announce().await.unwrap(), SenderState::Announcing);

        // Neither does an unframed datagram.
        peer.send_raw(b"hello", me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(s.announce().await.unwrap(), SenderState::Announcing);

        peer.send_packet(&Packet::ack(SEQ_SIZE_ANNOUNCE), me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(s.announce().await.unwrap(), SenderState::Streaming);
        assert_eq!(seqs(&s), vec![1, 2, 3]);
        assert_eq!(s.report.announcements, 3);
    }

    #[tokio::test]
    async fn unacked_slots_are_resent_each_round() {
        let (mut s, peer) = sender_for(2000).await;
        s.fill().await.unwrap();
        let me = s.socket.local_addr;

        s.round().await.unwrap();
        assert_eq!(s.report.frames_sent, 2);
        assert_eq!(s.report.retransmissions, 0);

        peer.send_packet(&Packet::ack(1), me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        s.round().await.unwrap();
        // The ack is read only after both slots were resent.
        assert_eq!(s.report.frames_sent, 4);
        assert_eq!(s.report.retransmissions, 2);
        assert!(s.window().iter().next().unwrap().acked);

        s.round().await.unwrap();
        assert_eq!(s.report.frames_sent, 5);
    }

    #[tokio::test]
    async fn corrupt_acks_consume_attempts() {
        let (mut s, peer) = sender_for(1000).await;
        s.fill().await.unwrap();
        let me = s.socket.local_addr;

        // Five garbage datagrams exhaust the budget before the real ack.
        for _ in 0..5 {
            peer.send_raw(&[0xEE; 1024], me).await.unwrap();
        }
        peer.send_packet(&Packet::ack(1), me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(s.collect_acks().await.unwrap(), 0);
        assert!(!s.window().all_acked());
        assert_eq!(s.collect_acks().await.unwrap(), 1);
        assert!(s.window().all_acked());
    }

    #[tokio::test]
    async fn idle_round_listens_for_full_budget() {
        let (mut s, _peer) = sender_for(2000).await;
        s.config = TransferConfig::default();
        s.fill().await.unwrap();

        let started = std::time::Instant::now();
        s.round().await.unwrap();
        let took = started.elapsed();

        let budget = s.config.round_budget();
        assert!(took >= budget * 9 / 10, "round took {took:?}, budget {budget:?}");
        assert_eq!(s.report.frames_sent, 2);
    }

    #[tokio::test]
    async fn drain_of_empty_window_finishes_immediately() {
        let (mut s, _peer) = sender_for(0).await;
        s.fill().await.unwrap();
        assert_eq!(s.stream_round().await.unwrap(), SenderState::Draining);
        assert_eq!(s.drain_round().await.unwrap(), SenderState::Done);
        assert_eq!(s.report.frames_sent, 0);
    }
}
