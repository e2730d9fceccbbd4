//! In-memory lossy network for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate datagrams.  To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`Simulator`] models one direction of a link as a queue of raw datagrams
//! and applies a configurable fault model on every send:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Loss        | Drop a datagram with probability `loss_rate`.            |
//! | Duplication | Deliver a datagram twice with probability `duplicate_rate`. |
//! | Reordering  | Hold a datagram back one delivery round with probability |
//! |             | `reorder_rate`, letting later datagrams overtake it.     |
//!
//! All randomness comes from a [`StdRng`] seeded from
//! [`SimulatorConfig::seed`], so a failing run replays exactly.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the fault-injection model.
///
/// Probabilities are clamped into `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a transparent, in-order pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorStats {
    pub sent: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// One direction of a simulated datagram link.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    /// Delivered on the next [`deliver`](Self::deliver).
    ready: VecDeque<Vec<u8>>,
    /// Held back by reordering during the current round.
    delayed: VecDeque<Vec<u8>>,
    /// Held back last round; delivered after `ready` this round.
    overdue: VecDeque<Vec<u8>>,
    stats: SimulatorStats,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let config = SimulatorConfig {
            loss_rate: config.loss_rate.clamp(0.0, 1.0),
            duplicate_rate: config.duplicate_rate.clamp(0.0, 1.0),
            reorder_rate: config.reorder_rate.clamp(0.0, 1.0),
            seed: config.seed,
        };
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            ready: VecDeque::new(),
            delayed: VecDeque::new(),
            overdue: VecDeque::new(),
            stats: SimulatorStats::default(),
        }
    }

    /// A fault-free link.
    pub fn reliable() -> Self {
        Self::new(SimulatorConfig::default())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    /// Put one datagram on the link, applying the fault model.
    pub fn send(&mut self, datagram: Vec<u8>) {
        self.stats.sent += 1;

        if self.rng.random_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::trace!("[sim] dropped {}-byte datagram", datagram.len());
            return;
        }

        if self.rng.random_bool(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            self.ready.push_back(datagram.clone());
        }

        if self.rng.random_bool(self.config.reorder_rate) {
            self.stats.reordered += 1;
            self.delayed.push_back(datagram);
        } else {
            self.ready.push_back(datagram);
        }
    }

    /// Take every datagram due this round, in arrival order.
    ///
    /// Datagrams held back during the previous round arrive after this
    /// round's in-order traffic.
    pub fn deliver(&mut self) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = self.ready.drain(..).collect();
        out.extend(self.overdue.drain(..));
        std::mem::swap(&mut self.overdue, &mut self.delayed);
        out
    }

    /// `true` when nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.delayed.is_empty() && self.overdue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagrams(n: u8) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i]).collect()
    }

    #[test]
    fn reliable_link_preserves_order() {
        let mut sim = Simulator::reliable();
        for d in datagrams(5) {
            sim.send(d);
        }
        assert_eq!(sim.deliver(), datagrams(5));
        assert!(sim.is_idle());
    }

    #[test]
    fn total_loss_drops_everything() {
        let mut sim = Simulator::new(SimulatorConfig {
            loss_rate: 1.0,
            ..SimulatorConfig::default()
        });
        for d in datagrams(10) {
            sim.send(d);
        }
        assert!(sim.deliver().is_empty());
        assert_eq!(sim.stats().dropped, 10);
    }

    #[test]
    fn duplication_delivers_twice() {
        let mut sim = Simulator::new(SimulatorConfig {
            duplicate_rate: 1.0,
            ..SimulatorConfig::default()
        });
        sim.send(vec![7]);
        assert_eq!(sim.deliver(), vec![vec![7], vec![7]]);
    }

    #[test]
    fn reordered_datagram_arrives_after_next_round() {
        let mut sim = Simulator::new(SimulatorConfig {
            reorder_rate: 1.0,
            ..SimulatorConfig::default()
        });
        sim.send(vec![1]);
        assert!(sim.deliver().is_empty());
        assert!(!sim.is_idle());
        assert_eq!(sim.deliver(), vec![vec![1]]);
        assert!(sim.is_idle());
    }

    #[test]
    fn same_seed_same_faults() {
        let cfg = SimulatorConfig {
            loss_rate: 0.3,
            duplicate_rate: 0.2,
            reorder_rate: 0.2,
            seed: 42,
        };
        let run = |cfg: SimulatorConfig| {
            let mut sim = Simulator::new(cfg);
            let mut out = Vec::new();
            for d in datagrams(50) {
                sim.send(d);
                out.extend(sim.deliver());
            }
            out.extend(sim.deliver());
            (out, sim.stats())
        };
        assert_eq!(run(cfg.clone()), run(cfg));
    }

    #[test]
    fn out_of_range_rates_are_clamped() {
        let sim = Simulator::new(SimulatorConfig {
            loss_rate: 3.0,
            duplicate_rate: -1.0,
            ..SimulatorConfig::default()
        });
        assert_eq!(sim.config().loss_rate, 1.0);
        assert_eq!(sim.config().duplicate_rate, 0.0);
    }
}
