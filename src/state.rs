//! Sender finite-state machine (FSM) types.
//!
//! Transitions are driven by [`crate::sender::Sender`]; each state has one
//! handler there that returns the next state.
//!
//! ```text
//!  ANNOUNCING ──size acked──▶ STREAMING ──end of file──▶ DRAINING
//!      │  ▲                     │  ▲                        │  ▲
//!      └──┘ resend size         └──┘ slide + refill         └──┘ resend unacked
//!                                                           │
//!                                                 all acked ▼
//!                                                          DONE
//! ```

/// All possible states of the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Repeating the size announcement until its acknowledgment arrives.
    #[default]
    Announcing,
    /// Sending the window, collecting acks, sliding and refilling.
    Streaming,
    /// Source exhausted; resending until every slot is acknowledged.
    Draining,
    /// Terminator sent.
    Done,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SenderState::Announcing => "ANNOUNCING",
            SenderState::Streaming => "STREAMING",
            SenderState::Draining => "DRAINING",
            SenderState::Done => "DONE",
        };
        f.write_str(name)
    }
}
