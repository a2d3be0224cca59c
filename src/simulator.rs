//! Network simulator for deterministic testing.
//!
//! Real networks drop, duplicate, and corrupt packets.  To exercise the
//! retransmission machinery without depending on actual network conditions,
//! [`Simulator`] wraps any [`Datagram`] and applies a fault model to
//! everything sent through it:
//!
//! | Fault       | Description                                            |
//! |-------------|--------------------------------------------------------|
//! | Loss        | Drop a frame with probability `loss_rate`.             |
//! | Corruption  | Flip one random bit with probability `corrupt_rate`.   |
//! | Duplication | Deliver a frame twice with probability `duplicate_rate`. |
//! | Scripted    | Apply a fault to the next N frames carrying a given seq. |
//!
//! Random faults come from a seeded RNG, so a failing run can be replayed.
//! Only full-size frames are eligible; the unframed filename request always
//! passes through untouched.  Receives are forwarded unchanged.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::FRAME_LEN;
use crate::socket::Datagram;

/// Configuration for the random fault model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that a frame is silently dropped.
    pub loss_rate: f64,
    /// Probability that one bit of a frame is flipped.
    pub corrupt_rate: f64,
    /// Probability that a frame is sent twice.
    pub duplicate_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

/// What to do to a matching frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Drop,
    Corrupt,
    Duplicate,
}

#[derive(Debug)]
struct ScriptedFault {
    seq: i32,
    fault: Fault,
    remaining: u32,
}

/// Counters of what the simulator did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
}

/// A fault-injecting wrapper around another datagram transport.
pub struct Simulator<D> {
    inner: D,
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
    script: Mutex<Vec<ScriptedFault>>,
    spared: Vec<i32>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    corrupted: AtomicU64,
    duplicated: AtomicU64,
}

impl<D: Datagram> Simulator<D> {
    pub fn new(inner: D, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng: Mutex::new(rng),
            script: Mutex::new(Vec::new()),
            spared: Vec::new(),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            corrupted: AtomicU64::new(0),
            duplicated: AtomicU64::new(0),
        }
    }

    /// A pass-through simulator; faults come only from [`Self::script`].
    pub fn transparent(inner: D) -> Self {
        Self::new(inner, SimulatorConfig::default())
    }

    /// Apply `fault` to the next `times` outbound frames whose sequence
    /// number is `seq`.  Scripted faults take precedence over random ones.
    pub fn script(self, seq: i32, fault: Fault, times: u32) -> Self {
        self.lock_script().push(ScriptedFault {
            seq,
            fault,
            remaining: times,
        });
        self
    }

    /// Exempt frames carrying `seq` from random faults.  Scripted faults
    /// still apply.
    pub fn spare(mut self, seq: i32) -> Self {
        self.spared.push(seq);
        self
    }

    pub fn stats(&self) -> SimulatorStats {
        SimulatorStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            duplicated: self.duplicated.load(Ordering::Relaxed),
        }
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, Vec<ScriptedFault>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consume one scripted fault for `seq`, if any.
    fn take_scripted(&self, seq: i32) -> Option<Fault> {
        let mut script = self.lock_script();
        let entry = script
            .iter_mut()
            .find(|f| f.seq == seq && f.remaining > 0)?;
        entry.remaining -= 1;
        Some(entry.fault)
    }

    /// Decide the fault for one frame; `None` means deliver as-is.
    fn pick_fault(&self, buf: &[u8]) -> Option<Fault> {
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&buf[1..5]);
        let seq = i32::from_le_bytes(seq);

        if let Some(fault) = self.take_scripted(seq) {
            return Some(fault);
        }
        if self.spared.contains(&seq) {
            return None;
        }
        let mut rng = self.lock_rng();
        if rng.random_bool(self.config.loss_rate.clamp(0.0, 1.0)) {
            Some(Fault::Drop)
        } else if rng.random_bool(self.config.corrupt_rate.clamp(0.0, 1.0)) {
            Some(Fault::Corrupt)
        } else if rng.random_bool(self.config.duplicate_rate.clamp(0.0, 1.0)) {
            Some(Fault::Duplicate)
        } else {
            None
        }
    }
}

#[async_trait]
impl<D: Datagram> Datagram for Simulator<D> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        if buf.len() != FRAME_LEN {
            return self.inner.send_to(buf, dest).await;
        }

        match self.pick_fault(buf) {
            None => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                self.inner.send_to(buf, dest).await
            }
            Some(Fault::Drop) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] dropped frame to {dest}");
                Ok(buf.len())
            }
            Some(Fault::Corrupt) => {
                let bit = self.lock_rng().random_range(0..buf.len() * 8);
                let mut mangled = buf.to_vec();
                mangled[bit / 8] ^= 1 << (bit % 8);
                self.corrupted.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] corrupted frame to {dest} at bit {bit}");
                self.inner.send_to(&mangled, dest).await
            }
            Some(Fault::Duplicate) => {
                self.duplicated.fetch_add(1, Ordering::Relaxed);
                self.inner.send_to(buf, dest).await?;
                self.inner.send_to(buf, dest).await
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
