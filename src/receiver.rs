//! Receive side: size handshake and positional reassembly.
//!
//! [`Receiver`] asks for a file, learns its length from the first valid
//! size announcement, then acknowledges and writes every valid data frame
//! at `(seq − 1) × 1011` until the terminator arrives.
//!
//! Writes are positional, so duplicates and reordering need no special
//! handling: a resent frame simply overwrites the same bytes.  The
//! decision for each frame lives in [`TransferPlan::classify`], which is
//! pure and tested without a socket.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;
use crate::packet::{Decoded, Packet, MAX_PAYLOAD, SEQ_SIZE_ANNOUNCE, SEQ_TERMINATE};
use crate::socket::{RecvError, Socket};

// ---------------------------------------------------------------------------
// TransferPlan
// ---------------------------------------------------------------------------

/// Packet layout implied by the announced file length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub total_len: u64,
    /// Sequence number of the last data packet.
    pub final_seq: i32,
    /// Meaningful payload bytes in the last data packet.
    pub final_len: usize,
}

/// What to do with one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Terminator: stop receiving.
    Complete,
    /// Failed checksum: drop without acknowledging.
    DropCorrupt,
    /// Repeated size announcement: drop without acknowledging.
    DropAnnouncement,
    /// Valid data outside the announced range: acknowledge only.
    AckOnly { seq: i32 },
    /// Acknowledge, then write `len` payload bytes at `offset`.
    Write { seq: i32, offset: u64, len: usize },
}

impl TransferPlan {
    /// Derive the packet layout from the announced length.
    ///
    /// A length that is an exact multiple of the chunk size ends on a full
    /// packet; an empty file still reports `final_seq = 1, final_len = 0`.
    pub fn from_len(total_len: u64) -> Self {
        let chunk = MAX_PAYLOAD as u64;
        let (final_seq, final_len) = match (total_len / chunk, total_len % chunk) {
            (0, 0) => (1, 0),
            (full, 0) => (full, chunk),
            (full, rem) => (full + 1, rem),
        };
        Self {
            total_len,
            final_seq: final_seq as i32,
            final_len: final_len as usize,
        }
    }

    /// Distinct data packets the sender will create; zero for an empty file.
    pub fn expected_packets(&self) -> u64 {
        if self.total_len == 0 {
            0
        } else {
            self.final_seq as u64
        }
    }

    /// Byte offset of the payload carried by data packet `seq`.
    pub fn offset(seq: i32) -> u64 {
        (seq as u64 - 1) * MAX_PAYLOAD as u64
    }

    /// Decide what to do with `frame`.
    ///
    /// The terminator is honoured even when its checksum fails: it is sent
    /// only once, so dropping it would leave the receiver waiting forever.
    pub fn classify(&self, frame: &Decoded) -> Step {
        if frame.seq == SEQ_TERMINATE {
            return Step::Complete;
        }
        if frame.corrupt {
            return Step::DropCorrupt;
        }
        if frame.seq == SEQ_SIZE_ANNOUNCE {
            return Step::DropAnnouncement;
        }
        if frame.seq < 1 || frame.seq > self.final_seq {
            return Step::AckOnly { seq: frame.seq };
        }

        let len = if frame.seq == self.final_seq {
            self.final_len
        } else {
            MAX_PAYLOAD
        };
        Step::Write {
            seq: frame.seq,
            offset: Self::offset(frame.seq),
            len,
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// What a completed receive did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveReport {
    /// Length from the size announcement.
    pub total_len: u64,
    /// Data frames written, duplicates included.
    pub frames_written: u64,
    /// Data frames whose sequence number had already been written.
    pub duplicates: u64,
    /// Frames dropped for a bad checksum.
    pub corrupt_dropped: u64,
    /// Data packets never written when the terminator arrived.
    pub missing_packets: u64,
    pub acks_sent: u64,
    pub elapsed: Duration,
}

/// Receive side of one transfer.
pub struct Receiver<W> {
    socket: Socket,
    server: SocketAddr,
    sink: W,
    written: HashSet<i32>,
    report: ReceiveReport,
}

impl<W: AsyncWrite + AsyncSeek + Unpin + Send> Receiver<W> {
    /// Prepare to fetch from `server`, writing into `sink`.
    pub fn new(socket: Socket, server: SocketAddr, sink: W) -> Self {
        Self {
            socket,
            server,
            sink,
            written: HashSet::new(),
            report: ReceiveReport::default(),
        }
    }

    /// Request `filename` and receive it to completion.
    ///
    /// Returns the report and the sink, flushed.
    pub async fn run(mut self, filename: &str) -> Result<(ReceiveReport, W), TransferError> {
        let started = Instant::now();

        self.socket.send_raw(filename.as_bytes(), self.server).await?;
        log::info!("[receiver] → REQUEST {filename:?} to {}", self.server);

        let plan = self.await_size().await?;
        log::info!(
            "[receiver] file length {} bytes; final packet {} carries {} bytes",
            plan.total_len,
            plan.final_seq,
            plan.final_len
        );

        self.reassemble(&plan).await?;
        self.sink.flush().await?;

        self.report.elapsed = started.elapsed();
        let secs = self.report.elapsed.as_secs_f64().max(f64::EPSILON);
        log::info!("[receiver] === Receive Complete ===");
        log::info!(
            "[receiver] {} bytes, {} frames written ({} duplicate), {} corrupt dropped",
            self.report.total_len,
            self.report.frames_written,
            self.report.duplicates,
            self.report.corrupt_dropped
        );
        log::info!(
            "[receiver] {:.2} s, {:.2} KB/s",
            secs,
            self.report.total_len as f64 / 1024.0 / secs
        );
        Ok((self.report, self.sink))
    }

    /// Wait for the first valid size announcement and acknowledge it once.
    async fn await_size(&mut self) -> Result<TransferPlan, TransferError> {
        loop {
            let (frame, addr) = match self.socket.recv_frame(None).await {
                Ok(v) => v,
                Err(RecvError::Io(e)) => return Err(e.into()),
                Err(RecvError::Corrupt { .. }) => {
                    self.report.corrupt_dropped += 1;
                    continue;
                }
                Err(RecvError::Timeout) => continue,
            };
            if frame.seq != SEQ_SIZE_ANNOUNCE {
                log::debug!("[receiver] ignoring seq={} before size announcement", frame.seq);
                continue;
            }

            let announced = frame.announced_len();
            let Ok(total_len) = u64::try_from(announced) else {
                log::warn!("[receiver] ignoring negative size announcement {announced}");
                continue;
            };

            self.socket.send_packet(&Packet::ack(SEQ_SIZE_ANNOUNCE), addr).await?;
            self.report.acks_sent += 1;
            self.report.total_len = total_len;
            self.server = addr;
            log::debug!("[receiver] ← SIZE len={total_len}; → ACK");
            return Ok(TransferPlan::from_len(total_len));
        }
    }

    /// Acknowledge and write data frames until the terminator arrives.
    async fn reassemble(&mut self, plan: &TransferPlan) -> Result<(), TransferError> {
        loop {
            let (frame, addr) = match self.socket.recv_decoded(None).await {
                Ok(v) => v,
                Err(RecvError::Io(e)) => return Err(e.into()),
                Err(_) => continue,
            };

            match plan.classify(&frame) {
                Step::Complete => {
                    let missing = plan
                        .expected_packets()
                        .saturating_sub(self.written.len() as u64);
                    self.report.missing_packets = missing;
                    if missing > 0 {
                        log::warn!(
                            "[receiver] ← FIN with {missing} of {} packets unwritten{}",
                            plan.expected_packets(),
                            if frame.corrupt { " (terminator failed checksum)" } else { "" }
                        );
                    } else {
                        log::info!("[receiver] ← FIN; transfer complete");
                    }
                    return Ok(());
                }
                Step::DropCorrupt => {
                    self.report.corrupt_dropped += 1;
                    log::debug!("[receiver] ← corrupt frame (seq {}) dropped", frame.seq);
                }
                Step::DropAnnouncement => {
                    log::trace!("[receiver] ← repeated SIZE dropped");
                }
                Step::AckOnly { seq } => {
                    log::warn!(
                        "[receiver] seq={seq} is outside 1..={}; acknowledging without writing",
                        plan.final_seq
                    );
                    self.ack(seq, addr).await?;
                }
                Step::Write { seq, offset, len } => {
                    self.ack(seq, addr).await?;
                    self.sink.seek(SeekFrom::Start(offset)).await?;
                    self.sink.write_all(&frame.payload[..len]).await?;

                    self.report.frames_written += 1;
                    if !self.written.insert(seq) {
                        self.report.duplicates += 1;
                    }
                    log::debug!("[receiver] ← DATA seq={seq} wrote {len} bytes at {offset}");
                }
            }
        }
    }

    async fn ack(&mut self, seq: i32, dest: SocketAddr) -> Result<(), TransferError> {
        self.socket.send_packet(&Packet::ack(seq), dest).await?;
        self.report.acks_sent += 1;
        log::trace!("[receiver] → ACK seq={seq}");
        Ok(())
    }
}
