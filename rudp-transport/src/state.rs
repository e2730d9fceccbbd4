//! Connection finite-state machine (FSM) types.
//!
//! State transitions are *not* implemented here — they live in
//! [`crate::connection`], next to the counters they update.  This module only
//! names the states and which role starts where.
//!
//! ```text
//!  initiator:  ClientInit ──send SYN──▶ ClientAwaitSynAck ──recv SYN+ACK──▶ Established
//!
//!  responder:  ServerAwaitSyn ──recv SYN──▶ ServerStartReady
//!                  ──send SYN+ACK──▶ ServerAwaitFinalAck ──recv ACK──▶ Established
//! ```
//!
//! There is no teardown: `Established` is terminal.

/// Which side of the handshake this connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Active opener; sends the first SYN.
    Client,
    /// Passive opener; waits for a SYN.
    Server,
}

impl Role {
    /// The state a fresh connection of this role starts in.
    pub fn initial_state(self) -> ConnectionState {
        match self {
            Role::Client => ConnectionState::ClientInit,
            Role::Server => ConnectionState::ServerAwaitSyn,
        }
    }
}

/// All possible states of the connection FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Client has not sent its SYN yet.
    ClientInit,
    /// SYN sent; waiting for SYN+ACK.
    ClientAwaitSynAck,
    /// Server waiting for a SYN.
    ServerAwaitSyn,
    /// SYN received; SYN+ACK not yet sent.
    ServerStartReady,
    /// SYN+ACK sent; waiting for the final ACK.
    ServerAwaitFinalAck,
    /// Handshake complete; data transfer in progress.
    Established,
}

impl ConnectionState {
    pub fn is_established(self) -> bool {
        self == ConnectionState::Established
    }

    /// `true` while this side has a handshake segment in flight that a
    /// timeout should re-send.
    pub fn awaits_handshake_reply(self) -> bool {
        matches!(
            self,
            ConnectionState::ClientAwaitSynAck | ConnectionState::ServerAwaitFinalAck
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
