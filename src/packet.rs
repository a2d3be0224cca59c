//! Wire-format definitions for protocol frames.
//!
//! Every datagram exchanged after the filename request is a fixed-size
//! [`Frame`].  This module is responsible for:
//! - Defining the on-wire binary layout (kind, sequence, checksum, payload).
//! - Serialising a [`Packet`] into a frame ready for transmission.
//! - Deserialising raw bytes back into a [`Decoded`] view, reporting
//!   corruption instead of failing.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! The sequence number is **little-endian**; the checksum is a CRC32
//! widened to 64 bits and written **big-endian**.
//!
//! ```text
//!  0       1               5                               13
//! +-------+---------------+-------------------------------+--------------
//! | Kind  | Sequence (LE) |        Checksum (u64 BE)      | Payload ...
//! +-------+---------------+-------------------------------+--------------
//!                                                        up to byte 1024
//! ```
//!
//! Total frame size: [`FRAME_LEN`] = 1024 bytes, of which [`HEADER_LEN`] =
//! 13 are header and at most [`MAX_PAYLOAD`] = 1011 carry payload.  Unused
//! payload bytes are zero.

use thiserror::Error;

/// Size of every frame on the wire.
pub const FRAME_LEN: usize = 1024;

/// Byte length of the fixed header.
pub const HEADER_LEN: usize = 13;

/// Maximum payload bytes per frame; also the file chunk size.
pub const MAX_PAYLOAD: usize = FRAME_LEN - HEADER_LEN;

/// Sequence number of the file-size announcement.
pub const SEQ_SIZE_ANNOUNCE: i32 = -1;

/// Sequence number of the end-of-transfer notice.
pub const SEQ_TERMINATE: i32 = 0;

/// First sequence number assigned to a data packet.
pub const FIRST_DATA_SEQ: i32 = 1;

// Byte offsets of each field within the frame.
const OFF_KIND: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_CHECKSUM: usize = 5;
const CHECKSUM_LEN: usize = 8;

/// A complete serialised frame.
pub type Frame = [u8; FRAME_LEN];

/// Value of the leading `kind` byte.
///
/// Informational only; nothing branches on it when receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Ack,
    /// Any other byte value seen on the wire.
    Other(u8),
}

impl Kind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Kind::Data,
            1 => Kind::Ack,
            v => Kind::Other(v),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Kind::Data => 0,
            Kind::Ack => 1,
            Kind::Other(v) => v,
        }
    }
}

/// An outbound protocol message before serialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: Kind,
    pub seq: i32,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A data packet carrying one chunk of the file.
    pub fn data(seq: i32, payload: Vec<u8>) -> Self {
        Self {
            kind: Kind::Data,
            seq,
            payload,
        }
    }

    /// An acknowledgment for `seq`.  Carries no payload.
    pub fn ack(seq: i32) -> Self {
        Self {
            kind: Kind::Ack,
            seq,
            payload: Vec::new(),
        }
    }

    /// The size announcement: sequence −1, total length as 4 LE bytes.
    pub fn size_announcement(total_len: i32) -> Self {
        Self {
            kind: Kind::Data,
            seq: SEQ_SIZE_ANNOUNCE,
            payload: total_len.to_le_bytes().to_vec(),
        }
    }

    /// The end-of-transfer notice (sequence 0).
    pub fn terminator() -> Self {
        Self {
            kind: Kind::Ack,
            seq: SEQ_TERMINATE,
            payload: Vec::new(),
        }
    }

    /// Serialise this packet into a fixed-size frame.
    ///
    /// Fails only when the payload exceeds [`MAX_PAYLOAD`].
    pub fn encode(&self) -> Result<Frame, PacketError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(self.payload.len()));
        }

        let mut frame = [0u8; FRAME_LEN];
        frame[OFF_KIND] = self.kind.to_u8();
        frame[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_le_bytes());
        frame[HEADER_LEN..HEADER_LEN + self.payload.len()].copy_from_slice(&self.payload);

        let csum = frame_checksum(&frame);
        frame[OFF_CHECKSUM..OFF_CHECKSUM + CHECKSUM_LEN].copy_from_slice(&csum.to_be_bytes());

        Ok(frame)
    }
}

/// A frame as seen by the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub kind: Kind,
    pub seq: i32,
    /// Everything after the header: always [`MAX_PAYLOAD`] bytes, zero padded.
    pub payload: Vec<u8>,
    /// `true` when the stored checksum did not match the recomputed one.
    pub corrupt: bool,
}

impl Decoded {
    /// Read the announced file length out of a size-announcement payload.
    pub fn announced_len(&self) -> i32 {
        let mut len = [0u8; 4];
        len.copy_from_slice(&self.payload[..4]);
        i32::from_le_bytes(len)
    }
}

/// Parse a received datagram.
///
/// The bytes are laid into a zeroed [`FRAME_LEN`] buffer first, so short
/// datagrams are padded and long ones truncated.  Anything that does not
/// verify comes back with `corrupt = true`; this never fails.
pub fn decode(buf: &[u8]) -> Decoded {
    let mut frame = [0u8; FRAME_LEN];
    let n = buf.len().min(FRAME_LEN);
    frame[..n].copy_from_slice(&buf[..n]);

    let mut seq = [0u8; 4];
    seq.copy_from_slice(&frame[OFF_SEQ..OFF_SEQ + 4]);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(&frame[OFF_CHECKSUM..OFF_CHECKSUM + CHECKSUM_LEN]);

    Decoded {
        kind: Kind::from_u8(frame[OFF_KIND]),
        seq: i32::from_le_bytes(seq),
        payload: frame[HEADER_LEN..].to_vec(),
        corrupt: frame_checksum(&frame) != u64::from_be_bytes(stored),
    }
}

/// CRC32 (IEEE) of `frame` with the checksum field treated as zero,
/// widened to 64 bits.
///
/// The frame itself is not modified.
pub fn frame_checksum(frame: &Frame) -> u64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame[..OFF_CHECKSUM]);
    hasher.update(&[0u8; CHECKSUM_LEN]);
    hasher.update(&frame[OFF_CHECKSUM + CHECKSUM_LEN..]);
    u64::from(hasher.finalize())
}

/// Errors that can arise when building a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD}-byte frame capacity")]
    PayloadTooLarge(usize),
}
