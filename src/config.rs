//! Tunable timing parameters.
//!
//! The sender has no exponential back-off.  A round with no acks waits the
//! full `acks_per_round × recv_timeout`, and that is the retransmission
//! cadence for anything still unacknowledged.

use std::time::Duration;

/// Default bound on a single receive attempt.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(10);

/// Default number of receive attempts per round.
pub const DEFAULT_ACKS_PER_ROUND: usize = 5;

/// Sender-side timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// How long one receive may wait before it counts as a timeout.
    pub recv_timeout: Duration,
    /// Receive attempts per round.  Every attempt counts, valid or not.
    pub acks_per_round: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            acks_per_round: DEFAULT_ACKS_PER_ROUND,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Clamped to at least one attempt so a round always listens.
    pub fn with_acks_per_round(mut self, attempts: usize) -> Self {
        self.acks_per_round = attempts.max(1);
        self
    }

    /// Worst-case time one round spends waiting for acknowledgments.
    pub fn round_budget(&self) -> Duration {
        self.recv_timeout * self.acks_per_round as u32
    }
}
