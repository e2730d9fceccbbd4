//! Per-connection protocol engine.
//!
//! A [`Connection`] owns the complete state for one peer-to-peer session:
//! the handshake state, the [`Sender`] and [`Receiver`] halves, the pending
//! pure-ACK flag, and the application [`ByteSource`] / [`ByteSink`].  Its two
//! entry points are synchronous and never block:
//!
//! - [`on_segment_received`](Connection::on_segment_received) — feed one
//!   decoded inbound segment.
//! - [`produce_next_segment`](Connection::produce_next_segment) — call until
//!   it returns `None` to collect everything currently sendable.
//!
//! No socket or clock is touched here; [`crate::driver`] owns both.  Several
//! connections are simply several independent `Connection` values.

use rand::Rng;

use crate::app::{ByteSink, ByteSource};
use crate::buffer::{ReceiveQueue, SendQueue};
use crate::config::Config;
use crate::packet::{flags, Segment};
use crate::receiver::{Delivery, Receiver};
use crate::sender::{AckOutcome, Sender};
use crate::state::{ConnectionState, Role};

/// Pick an initial sequence number from `{100, 200, …, 1000}`.
pub fn random_isn() -> u32 {
    rand::rng().random_range(1..=10u32) * 100
}

/// A single reliable connection, generic over its application source and sink.
pub struct Connection<S, K> {
    role: Role,
    state: ConnectionState,
    /// Initial sequence number this side used for its SYN / SYN+ACK.
    isn: u32,
    sender: Sender,
    receiver: Receiver,
    /// An ACK-only segment must go out before any new data.
    pure_ack_pending: bool,
    /// The SYN or SYN+ACK awaiting a reply, re-sent on timeout.
    handshake_in_flight: Option<Segment>,
    source: S,
    sink: K,
}

impl<S: ByteSource, K: ByteSink> Connection<S, K> {
    /// Create a connection in the role's initial state with a random ISN.
    pub fn new(role: Role, config: &Config, source: S, sink: K) -> Self {
        Self::with_isn(role, random_isn(), config, source, sink)
    }

    /// Create a connection with a fixed initial sequence number.
    pub fn with_isn(role: Role, isn: u32, config: &Config, source: S, sink: K) -> Self {
        log::debug!("[handshake] new {role:?} connection, isn={isn}");
        Self {
            role,
            state: role.initial_state(),
            isn,
            sender: Sender::new(isn, config.min_window),
            receiver: Receiver::new(config.max_window),
            pure_ack_pending: false,
            handshake_in_flight: None,
            source,
            sink,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn isn(&self) -> u32 {
        self.isn
    }

    /// Next sequence number this side will use.
    pub fn local_seq(&self) -> u32 {
        self.sender.next_seq()
    }

    /// Next sequence number expected from the peer (our cumulative ACK).
    pub fn local_ack(&self) -> u32 {
        self.receiver.ack_number()
    }

    pub fn last_ack_from_peer(&self) -> u32 {
        self.sender.last_ack()
    }

    pub fn duplicate_ack_count(&self) -> u32 {
        self.sender.duplicate_acks()
    }

    pub fn reset_duplicate_acks(&mut self) {
        self.sender.reset_duplicate_acks();
    }

    pub fn peer_receive_window(&self) -> u16 {
        self.sender.peer_window()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.sender.outstanding_bytes()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.receiver.buffered_bytes()
    }

    /// Window this side currently advertises.
    pub fn advertised_window(&self) -> u16 {
        self.receiver.window_size()
    }

    pub fn pure_ack_pending(&self) -> bool {
        self.pure_ack_pending
    }

    pub fn send_queue(&self) -> &SendQueue {
        self.sender.queue()
    }

    pub fn receive_queue(&self) -> &ReceiveQueue {
        self.receiver.queue()
    }

    /// The oldest unacknowledged data segment.
    pub fn base_segment(&self) -> Option<&Segment> {
        self.sender.base()
    }

    /// `true` when a timeout would have something to re-send: a base data
    /// segment, or a handshake segment still awaiting its reply.
    pub fn has_retransmittable(&self) -> bool {
        self.sender.base().is_some()
            || (self.state.awaits_handshake_reply() && self.handshake_in_flight.is_some())
    }

    /// The segment a timeout or fast retransmit should re-send verbatim.
    ///
    /// This is the base data segment when one exists, otherwise the SYN or
    /// SYN+ACK awaiting its reply.
    pub fn retransmit_base(&mut self) -> Option<Segment> {
        if let Some(base) = self.sender.retransmit_base() {
            return Some(base.clone());
        }
        if self.state.awaits_handshake_reply() {
            return self.handshake_in_flight.clone();
        }
        None
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Produce the next segment to transmit, or `None` when nothing is
    /// currently sendable.
    pub fn produce_next_segment(&mut self) -> Option<Segment> {
        match self.state {
            ConnectionState::ClientInit => {
                let syn = Segment::control(self.isn, 0, flags::SYN, self.advertised_window());
                self.handshake_in_flight = Some(syn.clone());
                self.transition(ConnectionState::ClientAwaitSynAck);
                log::trace!("[handshake] → SYN seq={}", syn.seq());
                Some(syn)
            }
            ConnectionState::ServerStartReady => {
                let syn_ack = Segment::control(
                    self.isn,
                    self.local_ack(),
                    flags::SYN | flags::ACK,
                    self.advertised_window(),
                );
                self.sender.consume_syn();
                self.handshake_in_flight = Some(syn_ack.clone());
                self.transition(ConnectionState::ServerAwaitFinalAck);
                log::trace!("[handshake] → SYN+ACK seq={} ack={}", syn_ack.seq(), syn_ack.ack());
                Some(syn_ack)
            }
            ConnectionState::Established => self.produce_established(),
            ConnectionState::ClientAwaitSynAck
            | ConnectionState::ServerAwaitSyn
            | ConnectionState::ServerAwaitFinalAck => None,
        }
    }

    fn produce_established(&mut self) -> Option<Segment> {
        if self.pure_ack_pending {
            self.pure_ack_pending = false;
            let ack = Segment::control(
                self.local_seq(),
                self.local_ack(),
                flags::ACK,
                self.advertised_window(),
            );
            log::trace!("[send] → ACK ack={} win={}", ack.ack(), ack.header.window);
            return Some(ack);
        }

        let ack = self.receiver.ack_number();
        let window = self.receiver.window_size();
        let segment = self.sender.next_data_segment(&mut self.source, ack, window)?;
        log::trace!(
            "[send] → DATA seq={} len={} outstanding={}",
            segment.seq(),
            segment.len(),
            self.sender.outstanding_bytes()
        );
        Some(segment)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Process one decoded inbound segment.
    ///
    /// Segments that make no sense in the current state are ignored.
    pub fn on_segment_received(&mut self, segment: Segment) {
        let syn = segment.has(flags::SYN);
        let ack = segment.has(flags::ACK);

        match self.state {
            ConnectionState::ServerAwaitSyn if syn && !ack => {
                self.receiver.synchronize(segment.seq());
                self.sender.set_peer_window(segment.header.window);
                log::trace!("[handshake] ← SYN seq={}", segment.seq());
                self.transition(ConnectionState::ServerStartReady);
            }
            ConnectionState::ClientAwaitSynAck
                if syn && ack && segment.ack() == self.isn.wrapping_add(1) =>
            {
                self.receiver.synchronize(segment.seq());
                self.sender.consume_syn();
                self.sender.synchronize(segment.ack());
                self.sender.set_peer_window(segment.header.window);
                self.handshake_in_flight = None;
                self.pure_ack_pending = true;
                log::trace!("[handshake] ← SYN+ACK seq={} ack={}", segment.seq(), segment.ack());
                self.transition(ConnectionState::Established);
            }
            ConnectionState::ServerAwaitFinalAck
                if ack && !syn && segment.ack() == self.local_seq() =>
            {
                self.sender.synchronize(segment.ack());
                self.handshake_in_flight = None;
                log::trace!("[handshake] ← ACK ack={}", segment.ack());
                self.transition(ConnectionState::Established);
                // The completing ACK may already carry data.
                self.on_established_segment(segment);
            }
            ConnectionState::Established if syn => {
                // Our ACK of the SYN+ACK was lost and the peer re-sent it.
                if self.role == Role::Client && ack {
                    log::trace!("[handshake] ← repeated SYN+ACK; re-acknowledging");
                    self.pure_ack_pending = true;
                }
            }
            ConnectionState::Established => self.on_established_segment(segment),
            state => {
                log::trace!(
                    "[handshake] ignoring seq={} flags={:#04x} in {state}",
                    segment.seq(),
                    segment.header.flags
                );
            }
        }
    }

    fn on_established_segment(&mut self, segment: Segment) {
        self.sender.set_peer_window(segment.header.window);

        if segment.has(flags::ACK) {
            match self.sender.on_ack(segment.ack()) {
                AckOutcome::Advanced(n) => log::trace!(
                    "[recv] ← ACK ack={} released={n} outstanding={}",
                    segment.ack(),
                    self.sender.outstanding_bytes()
                ),
                AckOutcome::Duplicate(count) => {
                    log::trace!("[recv] ← duplicate ACK ack={} count={count}", segment.ack())
                }
                AckOutcome::Ignored => {}
            }
        }

        if segment.is_empty() {
            return;
        }

        let (seq, len) = (segment.seq(), segment.len());
        match self.receiver.on_segment(segment, &mut self.sink) {
            Delivery::InOrder(n) => {
                log::trace!("[recv] ← DATA seq={seq} len={len} delivered={n}")
            }
            Delivery::Buffered => log::trace!(
                "[recv] ← DATA seq={seq} len={len} buffered (expecting {})",
                self.receiver.ack_number()
            ),
            Delivery::Duplicate => log::trace!("[recv] ← DATA seq={seq} len={len} duplicate"),
            Delivery::OutOfWindow => log::debug!(
                "[recv] ← DATA seq={seq} len={len} beyond window {}; dropped",
                self.receiver.window_size()
            ),
        }
        self.pure_ack_pending = true;
    }

    fn transition(&mut self, next: ConnectionState) {
        log::debug!("[handshake] {} → {next}", self.state);
        self.state = next;
    }
}

impl<S, K> std::fmt::Debug for Connection<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("isn", &self.isn)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("pure_ack_pending", &self.pure_ack_pending)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    type TestConn = Connection<VecDeque<u8>, Vec<u8>>;

    fn conn(role: Role, isn: u32) -> TestConn {
        Connection::with_isn(role, isn, &Config::default(), VecDeque::new(), Vec::new())
    }

    fn ack_segment(seq: u32, ack: u32, window: u16) -> Segment {
        Segment::control(seq, ack, flags::ACK, window)
    }

    fn data(seq: u32, ack: u32, payload: &[u8]) -> Segment {
        let mut seg = Segment::control(seq, ack, flags::ACK, 1000);
        seg.payload = payload.to_vec();
        seg
    }

    /// Run the handshake in memory and return both established ends.
    fn established_pair(client_isn: u32, server_isn: u32) -> (TestConn, TestConn) {
        let mut client = conn(Role::Client, client_isn);
        let mut server = conn(Role::Server, server_isn);

        let syn = client.produce_next_segment().unwrap();
        server.on_segment_received(syn);
        let syn_ack = server.produce_next_segment().unwrap();
        client.on_segment_received(syn_ack);
        let ack = client.produce_next_segment().unwrap();
        server.on_segment_received(ack);
        (client, server)
    }

    #[test]
    fn random_isn_is_in_range() {
        for _ in 0..100 {
            let isn = random_isn();
            assert!((100..=1000).contains(&isn) && isn % 100 == 0, "isn={isn}");
        }
    }

    #[test]
    fn client_sends_syn_once() {
        let mut c = conn(Role::Client, 300);
        let syn = c.produce_next_segment().unwrap();
        assert_eq!(syn.seq(), 300);
        assert_eq!(syn.header.flags, flags::SYN);
        assert_eq!(c.state(), ConnectionState::ClientAwaitSynAck);
        assert!(c.produce_next_segment().is_none());
        assert!(c.has_retransmittable());
    }

    #[test]
    fn server_answers_syn_with_syn_ack() {
        let mut s = conn(Role::Server, 700);
        assert!(s.produce_next_segment().is_none());

        s.on_segment_received(Segment::control(300, 0, flags::SYN, 2000));
        assert_eq!(s.state(), ConnectionState::ServerStartReady);
        assert_eq!(s.local_ack(), 301);
        assert_eq!(s.peer_receive_window(), 2000);

        let syn_ack = s.produce_next_segment().unwrap();
        assert_eq!(syn_ack.seq(), 700);
        assert_eq!(syn_ack.ack(), 301);
        assert!(syn_ack.has(flags::SYN | flags::ACK));
        assert_eq!(s.local_seq(), 701);
        assert_eq!(s.state(), ConnectionState::ServerAwaitFinalAck);
    }

    #[test]
    fn handshake_completes_both_sides() {
        let (client, server) = established_pair(200, 900);
        assert!(client.state().is_established());
        assert!(server.state().is_established());
        assert_eq!(client.local_ack(), 901);
        assert_eq!(server.local_ack(), 201);
        assert_eq!(client.local_seq(), 201);
        assert_eq!(server.local_seq(), 901);
        assert!(!client.has_retransmittable());
        assert!(!server.has_retransmittable());
    }

    #[test]
    fn final_ack_is_pure_ack() {
        let mut client = conn(Role::Client, 200);
        client.produce_next_segment();
        client.on_segment_received(Segment::control(900, 201, flags::SYN | flags::ACK, 5000));
        assert!(client.pure_ack_pending());

        let ack = client.produce_next_segment().unwrap();
        assert_eq!(ack.header.flags, flags::ACK);
        assert_eq!(ack.seq(), 201);
        assert_eq!(ack.ack(), 901);
        assert!(ack.is_empty());
        assert!(!client.pure_ack_pending());
    }

    #[test]
    fn unexpected_segments_are_ignored() {
        let mut s = conn(Role::Server, 500);
        s.on_segment_received(ack_segment(1, 2, 3));
        s.on_segment_received(Segment::control(1, 2, flags::SYN | flags::ACK, 3));
        assert_eq!(s.state(), ConnectionState::ServerAwaitSyn);

        let mut c = conn(Role::Client, 400);
        c.on_segment_received(Segment::control(1, 0, flags::SYN, 3));
        assert_eq!(c.state(), ConnectionState::ClientInit);
        c.produce_next_segment();
        // SYN+ACK acknowledging the wrong ISN.
        c.on_segment_received(Segment::control(1, 999, flags::SYN | flags::ACK, 3));
        assert_eq!(c.state(), ConnectionState::ClientAwaitSynAck);
        // A bare SYN does not complete the client side.
        c.on_segment_received(Segment::control(1, 0, flags::SYN, 3));
        assert_eq!(c.state(), ConnectionState::ClientAwaitSynAck);
    }

    #[test]
    fn server_ignores_repeated_syn_while_awaiting_ack() {
        let mut s = conn(Role::Server, 500);
        s.on_segment_received(Segment::control(100, 0, flags::SYN, 3000));
        s.produce_next_segment();
        s.on_segment_received(Segment::control(100, 0, flags::SYN, 3000));
        assert_eq!(s.state(), ConnectionState::ServerAwaitFinalAck);
        assert!(s.produce_next_segment().is_none());
    }

    #[test]
    fn handshake_segment_is_retransmittable() {
        let mut s = conn(Role::Server, 500);
        s.on_segment_received(Segment::control(100, 0, flags::SYN, 3000));
        let syn_ack = s.produce_next_segment().unwrap();
        assert_eq!(s.retransmit_base(), Some(syn_ack));
        assert!(s.base_segment().is_none());
    }

    #[test]
    fn data_segment_completes_server_handshake() {
        let mut s = conn(Role::Server, 500);
        s.on_segment_received(Segment::control(100, 0, flags::SYN, 3000));
        s.produce_next_segment();

        // Client's pure ACK was lost; its first data segment arrives instead.
        s.on_segment_received(data(101, 501, b"early"));
        assert!(s.state().is_established());
        assert_eq!(s.sink(), b"early");
        assert_eq!(s.local_ack(), 102);
        assert!(s.pure_ack_pending());
    }

    #[test]
    fn client_reacknowledges_repeated_syn_ack() {
        let (mut client, _server) = established_pair(200, 900);
        assert!(!client.pure_ack_pending());
        client.on_segment_received(Segment::control(900, 201, flags::SYN | flags::ACK, 5000));
        assert!(client.pure_ack_pending());
        let ack = client.produce_next_segment().unwrap();
        assert_eq!(ack.ack(), 901);
        assert!(client.state().is_established());
    }

    #[test]
    fn pure_ack_takes_priority_over_data() {
        let (mut client, _server) = established_pair(200, 900);
        client.source_mut().extend(b"payload");
        client.on_segment_received(data(901, 201, b"x"));

        let first = client.produce_next_segment().unwrap();
        assert!(first.is_empty());
        assert_eq!(first.ack(), 902);
        let second = client.produce_next_segment().unwrap();
        assert_eq!(second.payload, b"payload");
        assert!(client.produce_next_segment().is_none());
    }

    #[test]
    fn data_segment_fields() {
        let (mut client, _server) = established_pair(200, 900);
        client.source_mut().extend(b"abc");
        let seg = client.produce_next_segment().unwrap();
        assert_eq!(seg.seq(), 201);
        assert_eq!(seg.ack(), 901);
        assert_eq!(seg.header.flags, flags::ACK);
        assert_eq!(seg.header.window, client.advertised_window());
        assert_eq!(client.local_seq(), 202);
        assert_eq!(client.outstanding_bytes(), 3);
        assert_eq!(client.base_segment(), Some(&seg));
    }

    #[test]
    fn window_update_applies_to_every_segment() {
        let (mut client, _server) = established_pair(200, 900);
        client.on_segment_received(ack_segment(901, 201, 12));
        assert_eq!(client.peer_receive_window(), 12);

        client.source_mut().extend([7u8; 40]);
        assert_eq!(client.produce_next_segment().unwrap().len(), 12);
        assert!(client.produce_next_segment().is_none());
    }

    #[test]
    fn stale_data_is_reacknowledged_without_delivery() {
        let (_client, mut server) = established_pair(200, 900);
        server.on_segment_received(data(201, 901, b"one"));
        server.produce_next_segment();

        server.on_segment_received(data(201, 901, b"one"));
        assert_eq!(server.sink(), b"one");
        assert!(server.receive_queue().is_empty());
        let ack = server.produce_next_segment().unwrap();
        assert_eq!(ack.ack(), 202);
    }

    #[test]
    fn segment_beyond_window_is_dropped_but_acknowledged() {
        let config = Config {
            max_window: 8,
            ..Config::default()
        };
        let mut server: TestConn =
            Connection::with_isn(Role::Server, 900, &config, VecDeque::new(), Vec::new());
        server.on_segment_received(Segment::control(200, 0, flags::SYN, 1000));
        server.produce_next_segment();
        server.on_segment_received(ack_segment(201, 901, 1000));
        assert!(server.state().is_established());

        server.on_segment_received(data(203, 901, b"0123456"));
        assert_eq!(server.advertised_window(), 1);
        server.produce_next_segment();

        server.on_segment_received(data(204, 901, b"too long"));
        assert_eq!(server.receive_queue().len(), 1);
        assert_eq!(server.buffered_bytes(), 7);
        let ack = server.produce_next_segment().unwrap();
        assert_eq!(ack.ack(), 201);
        assert_eq!(ack.header.window, 1);
    }

    #[test]
    fn duplicate_acks_counted_and_reset_by_progress() {
        let (mut client, _server) = established_pair(200, 900);
        client.source_mut().extend([1u8; 30]);
        client.on_segment_received(ack_segment(901, 201, 10));
        for _ in 0..3 {
            client.produce_next_segment();
            client.on_segment_received(ack_segment(901, 201, 100));
        }
        assert_eq!(client.duplicate_ack_count(), 3);

        client.on_segment_received(ack_segment(901, 202, 100));
        assert_eq!(client.duplicate_ack_count(), 0);
        assert_eq!(client.last_ack_from_peer(), 202);
    }
}
