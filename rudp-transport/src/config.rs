//! Protocol constants and adjustable engine parameters.

use std::time::Duration;

use crate::packet::MAX_PAYLOAD;

/// Peer window assumed before the first advertisement arrives.
pub const MIN_WINDOW: u16 = MAX_PAYLOAD as u16;

/// Largest window this side ever advertises.
pub const MAX_WINDOW: u16 = 40 * MAX_PAYLOAD as u16;

/// Retransmission timeout for the base segment.
pub const RTO: Duration = Duration::from_secs(1);

/// Duplicate ACKs that trigger a fast retransmit of the base segment.
pub const DUP_ACKS: u32 = 3;

/// Interval at which the run loop re-checks timers when the socket is idle.
pub const TICK: Duration = Duration::from_millis(10);

/// Adjustable connection parameters.
///
/// [`Config::default`] yields the protocol constants above; the binary lets
/// `--rto-ms`, `--dup-acks` and `--tick-ms` override them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ceiling of the advertised receive window, in bytes.
    pub max_window: u16,
    /// Peer receive window assumed until the peer advertises one.
    pub min_window: u16,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Duplicate-ACK threshold for fast retransmit.
    pub dup_acks: u32,
    /// Run-loop tick interval.
    pub tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_window: MAX_WINDOW,
            min_window: MIN_WINDOW,
            rto: RTO,
            dup_acks: DUP_ACKS,
            tick: TICK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_fit_the_wire_field() {
        assert_eq!(MIN_WINDOW as usize, MAX_PAYLOAD);
        assert_eq!(MAX_WINDOW as usize, 40 * MAX_PAYLOAD);
    }

    #[test]
    fn default_uses_protocol_constants() {
        let c = Config::default();
        assert_eq!(c.rto, Duration::from_secs(1));
        assert_eq!(c.dup_acks, 3);
        assert!(c.min_window <= c.max_window);
    }
}
