//! Retransmission timer.
//!
//! One [`RetransmitTimer`] per connection measures how long the base segment
//! has gone unacknowledged.  It is a passive clock reading: the driver
//! passes `now` in, which keeps the timer deterministic under a virtual
//! clock in tests.  The RTO is fixed; there is no RTT estimation or back-off.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    started: Instant,
}

impl RetransmitTimer {
    /// Start a timer at `now` with the given timeout.
    pub fn new(rto: Duration, now: Instant) -> Self {
        Self { rto, started: now }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Restart the measurement from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.started = now;
    }

    /// `true` once at least one RTO has passed since the last reset.
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.rto
    }

    /// Instant at which [`expired`](Self::expired) first becomes `true`.
    pub fn deadline(&self) -> Instant {
        self.started + self.rto
    }
}
