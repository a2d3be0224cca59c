//! Fixed-capacity send window.
//!
//! [`Window`] holds up to [`WINDOW_SIZE`] in-flight data packets, each with
//! an "acknowledged" flag.
//!
//! # Contract
//!
//! - Slots are ordered front-to-back by ascending sequence number.
//! - Acknowledgments are **selective**: each ack marks exactly the slot with
//!   the matching sequence number and nothing else.
//! - A slot leaves the window only through [`Window::pop_front_if_acked`],
//!   so the window slides past a contiguous acknowledged prefix and never
//!   past a hole.
//! - Missing slots at the back stand in for the empty slots left once the
//!   source file is exhausted.
//!
//! This module only manages state; socket and file I/O belong to
//! [`crate::sender`].

use std::collections::VecDeque;

use crate::packet::Packet;

/// Number of slots in the window.
pub const WINDOW_SIZE: usize = 5;

/// A single in-flight data packet occupying one slot.
#[derive(Debug, Clone)]
pub struct Slot {
    pub packet: Packet,
    /// Set once a valid acknowledgment for `packet.seq` has arrived.
    pub acked: bool,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
}

/// The sender's sliding window.
///
/// ```text
///   front (oldest)                      back (newest)
///   ┌──────┬──────┬──────┬──────┬──────┐
///   │ s=4  │ s=5  │ s=6  │ s=7  │ s=8  │
///   │ ack  │      │ ack  │      │      │
///   └──────┴──────┴──────┴──────┴──────┘
///      ▲ pops; then s=5 blocks further sliding
/// ```
#[derive(Debug, Default)]
pub struct Window {
    slots: VecDeque<Slot>,
}

impl Window {
    pub fn new() -> Self {
        Self {
            slots: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// `true` when there is room for at least one more packet.
    pub fn has_room(&self) -> bool {
        self.slots.len() < WINDOW_SIZE
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots still awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| !s.acked).count()
    }

    /// Place a freshly created packet at the back of the window.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is already full.  Check
    /// [`has_room`](Self::has_room) before calling.
    pub fn push_back(&mut self, packet: Packet) {
        debug_assert!(
            self.has_room(),
            "push_back called on a full window ({} / {WINDOW_SIZE})",
            self.slots.len()
        );
        debug_assert!(
            self.slots.back().map_or(true, |s| s.packet.seq < packet.seq),
            "window sequence numbers must ascend"
        );
        self.slots.push_back(Slot {
            packet,
            acked: false,
            tx_count: 0,
        });
    }

    /// Remove the front slot if, and only if, it has been acknowledged.
    pub fn pop_front_if_acked(&mut self) -> Option<Slot> {
        match self.slots.front() {
            Some(front) if front.acked => self.slots.pop_front(),
            _ => None,
        }
    }

    /// Mark the slot carrying `seq` as acknowledged.
    ///
    /// Returns `true` if this ack was new.  Duplicate acks and acks for
    /// packets that have already slid out are no-ops.
    pub fn mark_acked(&mut self, seq: i32) -> bool {
        match self.slots.iter_mut().find(|s| s.packet.seq == seq) {
            Some(slot) if !slot.acked => {
                slot.acked = true;
                true
            }
            _ => false,
        }
    }

    /// `true` when every occupied slot is acknowledged (vacuously so when
    /// the window is empty).
    pub fn all_acked(&self) -> bool {
        self.slots.iter().all(|s| s.acked)
    }

    /// Iterate over all occupied slots, front to back.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    /// Iterate mutably over slots that still need (re)transmission.
    pub fn unacked_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut().filter(|s| !s.acked)
    }
}
