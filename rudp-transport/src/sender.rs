//! Send-side state: sequence numbers, peer window, unacknowledged segments.
//!
//! [`Sender`] turns application bytes into data segments while the peer's
//! advertised window has room, keeps every transmitted segment in a
//! [`SendQueue`] until a cumulative ACK covers it, and counts duplicate ACKs
//! for fast retransmit.  It does **not** touch the socket; the connection and
//! the driver decide when its output goes on the wire.
//!
//! # Sequence-number layout
//!
//! Every data segment consumes exactly one sequence number, as does the SYN.
//!
//! ```text
//!  base().seq          next_seq
//!      │                  │
//!  ────┼──────────────────┼──────────────────▶ seq space
//!      │ <── in flight ──▶│ <── sendable while window_room() > 0
//! ```

use std::io;

use crate::app::ByteSource;
use crate::buffer::SendQueue;
use crate::packet::{flags, Header, Segment, MAX_PAYLOAD};
use crate::seq::seq_gt;

/// What an inbound acknowledgement number did to the send side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// New data acknowledged; carries the number of segments released.
    Advanced(usize),
    /// Same ACK as before with data still outstanding; carries the new count.
    Duplicate(u32),
    /// Old, idle, or beyond anything sent; no state changed.
    Ignored,
}

/// Send-side state for one connection.
#[derive(Debug)]
pub struct Sender {
    /// Sequence number for the **next** new segment (`local_seq`).
    next_seq: u32,
    /// Highest cumulative ACK received from the peer.
    last_ack: u32,
    /// Consecutive duplicate ACKs since `last_ack` last advanced.
    duplicate_acks: u32,
    /// Receive window most recently advertised by the peer.
    peer_window: u16,
    /// Transmitted, unacknowledged segments (front = base).
    queue: SendQueue,
}

impl Sender {
    /// Create a new [`Sender`] whose first segment (the SYN) uses `isn`.
    ///
    /// `initial_peer_window` bounds outstanding bytes until the peer
    /// advertises its own window.
    pub fn new(isn: u32, initial_peer_window: u16) -> Self {
        Self {
            next_seq: isn,
            last_ack: isn,
            duplicate_acks: 0,
            peer_window: initial_peer_window,
            queue: SendQueue::new(),
        }
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn last_ack(&self) -> u32 {
        self.last_ack
    }

    pub fn duplicate_acks(&self) -> u32 {
        self.duplicate_acks
    }

    pub fn reset_duplicate_acks(&mut self) {
        self.duplicate_acks = 0;
    }

    pub fn peer_window(&self) -> u16 {
        self.peer_window
    }

    pub fn set_peer_window(&mut self, window: u16) {
        self.peer_window = window;
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.queue.outstanding_bytes()
    }

    pub fn queue(&self) -> &SendQueue {
        &self.queue
    }

    /// The oldest unacknowledged data segment.
    pub fn base(&self) -> Option<&Segment> {
        self.queue.base()
    }

    /// Count one more transmission of the base segment and return it.
    pub fn retransmit_base(&mut self) -> Option<&Segment> {
        self.queue.retransmit_base()
    }

    /// Consume one sequence number for a SYN.
    pub fn consume_syn(&mut self) {
        self.next_seq = self.next_seq.wrapping_add(1);
    }

    /// Adopt the ACK that completed the handshake as the cumulative baseline.
    pub fn synchronize(&mut self, ack: u32) {
        self.last_ack = ack;
        self.duplicate_acks = 0;
    }

    /// Bytes that may still be put in flight: peer window minus outstanding.
    pub fn window_room(&self) -> usize {
        (self.peer_window as usize).saturating_sub(self.queue.outstanding_bytes())
    }

    /// Pull the next chunk from `source` and turn it into a data segment.
    ///
    /// Returns `None` when the window is closed, the source has nothing
    /// ready, or the payload buffer cannot be allocated; in each case no
    /// state has changed.  On success the segment is already recorded in the
    /// send queue and `next_seq` has advanced.
    pub fn next_data_segment<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        ack: u32,
        window: u16,
    ) -> Option<Segment> {
        let room = self.window_room();
        if room == 0 {
            return None;
        }
        let chunk = MAX_PAYLOAD.min(room);

        let mut payload = Vec::new();
        if let Err(e) = payload.try_reserve_exact(chunk) {
            log::warn!("[send] cannot allocate {chunk}-byte payload: {e}");
            return None;
        }
        payload.resize(chunk, 0);

        let n = match source.read(&mut payload) {
            Ok(n) => n.min(chunk),
            Err(e) if is_not_ready(&e) => 0,
            Err(e) => {
                log::warn!("[send] application source error: {e}");
                0
            }
        };
        if n == 0 {
            return None;
        }
        payload.truncate(n);

        let segment = Segment {
            header: Header {
                seq: self.next_seq,
                ack,
                flags: flags::ACK, // data segments piggyback the receiver's ACK
                window,
            },
            payload,
        };
        self.queue.push(segment.clone());
        self.next_seq = self.next_seq.wrapping_add(1);
        Some(segment)
    }

    /// Process a cumulative ACK number from the peer.
    pub fn on_ack(&mut self, ack: u32) -> AckOutcome {
        // Acknowledges something never sent.
        if seq_gt(ack, self.next_seq) {
            return AckOutcome::Ignored;
        }

        if seq_gt(ack, self.last_ack) {
            let released = self.queue.acknowledge(ack);
            self.last_ack = ack;
            self.duplicate_acks = 0;
            AckOutcome::Advanced(released)
        } else if ack == self.last_ack && !self.queue.is_empty() {
            self.duplicate_acks += 1;
            AckOutcome::Duplicate(self.duplicate_acks)
        } else {
            AckOutcome::Ignored
        }
    }
}

fn is_not_ready(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
