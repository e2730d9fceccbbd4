//! Receive-side state: cumulative ACK, out-of-order buffering, delivery.
//!
//! [`Receiver`] accepts data segments in any order:
//!
//! - A segment at the next expected sequence number (`RCV.NXT`) is delivered
//!   to the application sink immediately, then every buffered segment that
//!   has become contiguous is delivered after it.
//! - A segment ahead of `RCV.NXT` is parked in the [`ReceiveQueue`] if it
//!   fits in the advertised window; otherwise it is discarded.
//! - A segment behind `RCV.NXT` is a stale retransmission and is dropped.
//!
//! Whatever happens, the caller should answer with a cumulative ACK carrying
//! [`ack_number`](Receiver::ack_number); this module never sends anything.

use crate::app::ByteSink;
use crate::buffer::ReceiveQueue;
use crate::packet::Segment;
use crate::seq::seq_gt;

/// What happened to an inbound data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered in order; carries the number of segments handed to the
    /// sink (this one plus any drained from the receive queue).
    InOrder(usize),
    /// Ahead of `RCV.NXT`; parked until the gap is filled.
    Buffered,
    /// Already received; nothing delivered or buffered.
    Duplicate,
    /// Ahead of `RCV.NXT` but past the advertised window; discarded.
    OutOfWindow,
}

/// Receive-side state for one connection.
#[derive(Debug)]
pub struct Receiver {
    /// Next expected sequence number (`RCV.NXT`, `local_ack`).
    rcv_nxt: u32,
    /// Segments received ahead of `rcv_nxt`.
    queue: ReceiveQueue,
    /// Ceiling of the advertised window.
    max_window: u16,
}

impl Receiver {
    /// Create a [`Receiver`] that has not yet seen the peer's SYN.
    pub fn new(max_window: u16) -> Self {
        Self {
            rcv_nxt: 0,
            queue: ReceiveQueue::new(),
            max_window,
        }
    }

    /// Record the peer's initial sequence number; its SYN consumes one
    /// sequence number, so the first data segment is expected at `isn + 1`.
    pub fn synchronize(&mut self, peer_isn: u32) {
        self.rcv_nxt = peer_isn.wrapping_add(1);
    }

    /// Cumulative ACK number to place in the next outbound segment.
    pub fn ack_number(&self) -> u32 {
        self.rcv_nxt
    }

    /// Advertised receive window: capacity minus bytes held out of order.
    pub fn window_size(&self) -> u16 {
        let buffered = self.queue.buffered_bytes().min(u16::MAX as usize) as u16;
        self.max_window.saturating_sub(buffered)
    }

    pub fn buffered_bytes(&self) -> usize {
        self.queue.buffered_bytes()
    }

    pub fn queue(&self) -> &ReceiveQueue {
        &self.queue
    }

    /// Process an inbound data segment, delivering whatever became in-order.
    pub fn on_segment<K: ByteSink + ?Sized>(&mut self, segment: Segment, sink: &mut K) -> Delivery {
        let seq = segment.seq();

        if seq == self.rcv_nxt {
            sink.write(&segment.payload);
            self.rcv_nxt = self.rcv_nxt.wrapping_add(1);

            let mut delivered = 1;
            while let Some(next) = self.queue.take(self.rcv_nxt) {
                sink.write(&next.payload);
                self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                delivered += 1;
            }
            Delivery::InOrder(delivered)
        } else if seq_gt(seq, self.rcv_nxt) {
            if self.queue.contains(seq) {
                Delivery::Duplicate
            } else if segment.len() > self.window_size() as usize {
                Delivery::OutOfWindow
            } else {
                self.queue.insert(segment);
                Delivery::Buffered
            }
        } else {
            Delivery::Duplicate
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
