//! Segment buffers owned by one connection.
//!
//! - [`SendQueue`] holds segments that were transmitted but not yet covered
//!   by a cumulative ACK, in transmission order.  Its head is the **base
//!   segment**, the subject of timeout and duplicate-ACK retransmission.
//! - [`ReceiveQueue`] holds segments that arrived ahead of the next expected
//!   sequence number, keyed by sequence number, until the gap before them is
//!   filled.
//!
//! Both keep a running byte total so window accounting never has to walk the
//! buffers.

use std::collections::{BTreeMap, VecDeque};

use crate::packet::Segment;
use crate::seq::{seq_gt, seq_lt};

// ---------------------------------------------------------------------------
// SendQueue
// ---------------------------------------------------------------------------

/// A transmitted segment awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct SendEntry {
    /// The segment exactly as first transmitted; retransmissions reuse it.
    pub segment: Segment,
    /// Total number of times this segment has been transmitted.
    pub tx_count: u32,
}

/// Unacknowledged outbound segments, oldest first.
///
/// ```text
///  base (oldest unacked)                 newest
///      │                                   │
///  ────┼───────────────────────────────────┼──────▶ seq space
///      │ <──── outstanding_bytes() ──────▶ │
/// ```
#[derive(Debug, Default)]
pub struct SendQueue {
    entries: VecDeque<SendEntry>,
    outstanding: usize,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a just-transmitted segment.
    ///
    /// Sequence numbers must be strictly increasing along the queue.
    pub fn push(&mut self, segment: Segment) {
        debug_assert!(
            self.entries
                .back()
                .map_or(true, |last| seq_gt(segment.seq(), last.segment.seq())),
            "send queue sequence numbers must increase"
        );
        self.outstanding += segment.len();
        self.entries.push_back(SendEntry {
            segment,
            tx_count: 1,
        });
    }

    /// Drop every entry whose sequence number precedes `ack` (cumulative ACK).
    ///
    /// Returns the number of entries removed.
    pub fn acknowledge(&mut self, ack: u32) -> usize {
        let before = self.entries.len();
        let mut released = 0usize;
        self.entries.retain(|entry| {
            if seq_lt(entry.segment.seq(), ack) {
                released += entry.segment.len();
                false
            } else {
                true
            }
        });
        self.outstanding -= released;
        before - self.entries.len()
    }

    /// The oldest unacknowledged segment.
    pub fn base(&self) -> Option<&Segment> {
        self.entries.front().map(|e| &e.segment)
    }

    /// Record one more transmission of the base segment and return it.
    pub fn retransmit_base(&mut self) -> Option<&Segment> {
        let entry = self.entries.front_mut()?;
        entry.tx_count += 1;
        Some(&entry.segment)
    }

    /// Sum of payload lengths of every queued segment.
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over queued segments from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &SendEntry> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// ReceiveQueue
// ---------------------------------------------------------------------------

/// Out-of-order inbound segments keyed by sequence number.
///
/// Only exact-key lookups are performed, so the raw `u32` ordering of the map
/// never matters across a sequence wrap.
#[derive(Debug, Default)]
pub struct ReceiveQueue {
    segments: BTreeMap<u32, Segment>,
    buffered: usize,
}

impl ReceiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `segment` under its sequence number.
    ///
    /// Returns `false` (and keeps the copy already held) when a segment with
    /// the same sequence number is buffered.
    pub fn insert(&mut self, segment: Segment) -> bool {
        let seq = segment.seq();
        if self.segments.contains_key(&seq) {
            return false;
        }
        self.buffered += segment.len();
        self.segments.insert(seq, segment);
        true
    }

    /// Remove and return the segment buffered at exactly `seq`.
    pub fn take(&mut self, seq: u32) -> Option<Segment> {
        let segment = self.segments.remove(&seq)?;
        self.buffered -= segment.len();
        Some(segment)
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.segments.contains_key(&seq)
    }

    /// Sum of payload lengths of every buffered segment.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
