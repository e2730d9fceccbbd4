//! Transmission scheduling and the async run loop.
//!
//! [`Driver`] wraps a [`Connection`] with its [`RetransmitTimer`] and decides,
//! for a given instant, which segments go on the wire: everything the engine
//! currently produces, plus at most one retransmission of the base segment
//! (on timeout, or after enough duplicate ACKs).  It never touches a socket,
//! so the whole schedule can be driven with a virtual clock.
//!
//! [`run`] is the production loop: a single task that multiplexes socket
//! readiness and a fixed tick with `tokio::select!` and feeds both into the
//! driver.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::app::{ByteSink, ByteSource};
use crate::config::Config;
use crate::connection::Connection;
use crate::packet::{PacketError, Segment};
use crate::socket::{Socket, SocketError};
use crate::timer::RetransmitTimer;

/// Counters kept by the driver for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    /// Segments handed to the network, retransmissions included.
    pub segments_sent: u64,
    pub timeouts: u64,
    pub fast_retransmits: u64,
    /// Datagrams discarded because they did not decode.
    pub malformed: u64,
}

pub struct Driver<S, K> {
    conn: Connection<S, K>,
    timer: RetransmitTimer,
    dup_ack_threshold: u32,
    stats: DriverStats,
}

impl<S: ByteSource, K: ByteSink> Driver<S, K> {
    pub fn new(conn: Connection<S, K>, config: &Config, now: Instant) -> Self {
        Self {
            conn,
            timer: RetransmitTimer::new(config.rto, now),
            dup_ack_threshold: config.dup_acks,
            stats: DriverStats::default(),
        }
    }

    pub fn connection(&self) -> &Connection<S, K> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection<S, K> {
        &mut self.conn
    }

    pub fn into_connection(self) -> Connection<S, K> {
        self.conn
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    /// Decode one raw datagram and feed it to the connection.
    ///
    /// A malformed datagram is counted, logged, and returned as an error; the
    /// connection is untouched.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        match Segment::decode(bytes) {
            Ok(segment) => {
                self.handle_segment(segment);
                Ok(())
            }
            Err(e) => {
                self.stats.malformed += 1;
                log::warn!("[driver] dropping {}-byte datagram: {e}", bytes.len());
                Err(e)
            }
        }
    }

    pub fn handle_segment(&mut self, segment: Segment) {
        self.conn.on_segment_received(segment);
    }

    /// Collect every segment that should be sent at `now`.
    ///
    /// New segments come first, in production order; a retransmission, if
    /// any, is last.
    pub fn poll_transmit(&mut self, now: Instant) -> Vec<Segment> {
        let mut out = Vec::new();
        while let Some(segment) = self.conn.produce_next_segment() {
            out.push(segment);
        }
        if !out.is_empty() {
            self.timer.reset(now);
        }

        if !self.conn.has_retransmittable() {
            self.timer.reset(now);
        } else if self.timer.expired(now) {
            if let Some(segment) = self.conn.retransmit_base() {
                log::debug!(
                    "[driver] RTO expired; retransmitting seq={} len={}",
                    segment.seq(),
                    segment.len()
                );
                self.stats.timeouts += 1;
                out.push(segment);
            }
            self.timer.reset(now);
        } else if self.conn.duplicate_ack_count() >= self.dup_ack_threshold {
            if let Some(segment) = self.conn.retransmit_base() {
                log::debug!(
                    "[driver] {} duplicate ACKs; fast retransmit seq={}",
                    self.conn.duplicate_ack_count(),
                    segment.seq()
                );
                self.stats.fast_retransmits += 1;
                out.push(segment);
                self.timer.reset(now);
            }
            self.conn.reset_duplicate_acks();
        }

        self.stats.segments_sent += out.len() as u64;
        out
    }
}

impl<S, K> std::fmt::Debug for Driver<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("conn", &self.conn)
            .field("timer", &self.timer)
            .field("stats", &self.stats)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Async run loop
// ---------------------------------------------------------------------------

/// Drive one connection over `socket` until a fatal socket error.
///
/// With `peer == None` (server side) the source address of the first valid
/// datagram becomes the peer; datagrams from any other address are dropped
/// from then on.  Malformed datagrams and ICMP-induced errors are logged and
/// skipped.  The loop never returns `Ok`; stop it by aborting its task.
pub async fn run<S: ByteSource, K: ByteSink>(
    socket: Socket,
    mut peer: Option<SocketAddr>,
    mut driver: Driver<S, K>,
    tick: Duration,
) -> Result<(), SocketError> {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!(
        "[driver] running on {} ({})",
        socket.local_addr,
        match peer {
            Some(p) => format!("peer {p}"),
            None => "awaiting peer".to_string(),
        }
    );

    loop {
        tokio::select! {
            result = socket.recv_from() => match result {
                Ok((segment, from)) => match peer {
                    Some(expected) if expected != from => {
                        log::trace!("[driver] ignoring datagram from {from}");
                    }
                    _ => {
                        if peer.is_none() {
                            log::info!("[driver] peer is {from}");
                            peer = Some(from);
                        }
                        driver.handle_segment(segment);
                    }
                },
                Err(SocketError::Packet(e)) => {
                    driver.stats.malformed += 1;
                    log::warn!("[driver] dropping datagram: {e}");
                }
                Err(e) if e.is_transient() => {
                    log::debug!("[driver] transient receive error: {e}");
                }
                Err(e) => return Err(e),
            },
            _ = ticker.tick() => {}
        }

        let Some(dest) = peer else { continue };
        for segment in driver.poll_transmit(Instant::now()) {
            match socket.send_to(&segment, dest).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    log::debug!("[driver] transient send error: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
