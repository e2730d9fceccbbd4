//! Shared harness: two drivers joined by a pair of simulated links, stepped
//! on a virtual clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rudp_transport::packet::Segment;
use rudp_transport::simulator::{Simulator, SimulatorConfig};
use rudp_transport::{Config, Connection, Driver, Role};

pub type TestDriver = Driver<VecDeque<u8>, Vec<u8>>;

pub const CLIENT_ISN: u32 = 300;
pub const SERVER_ISN: u32 = 800;

/// Test tunables: a short RTO so timeouts happen within a few dozen steps.
pub fn config() -> Config {
    Config {
        rto: Duration::from_millis(100),
        tick: Duration::from_millis(10),
        ..Config::default()
    }
}

pub fn driver(role: Role, isn: u32, cfg: &Config, now: Instant) -> TestDriver {
    let conn = Connection::with_isn(role, isn, cfg, VecDeque::new(), Vec::new());
    Driver::new(conn, cfg, now)
}

/// Deterministic pseudo-random test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Client and server drivers connected through two [`Simulator`]s.
pub struct Link {
    pub client: TestDriver,
    pub server: TestDriver,
    pub to_server: Simulator,
    pub to_client: Simulator,
    pub now: Instant,
    pub tick: Duration,
    /// Returns `true` for client→server segments that must be dropped.
    pub drop_to_server: Box<dyn FnMut(&Segment) -> bool>,
}

impl Link {
    pub fn new(to_server: SimulatorConfig, to_client: SimulatorConfig) -> Self {
        let cfg = config();
        let now = Instant::now();
        Self {
            client: driver(Role::Client, CLIENT_ISN, &cfg, now),
            server: driver(Role::Server, SERVER_ISN, &cfg, now),
            to_server: Simulator::new(to_server),
            to_client: Simulator::new(to_client),
            now,
            tick: cfg.tick,
            drop_to_server: Box::new(|_| false),
        }
    }

    pub fn reliable() -> Self {
        Self::new(SimulatorConfig::default(), SimulatorConfig::default())
    }

    /// Advance the clock one tick: deliver what is in flight, then let both
    /// sides transmit.
    pub fn step(&mut self) {
        self.now += self.tick;

        for datagram in self.to_server.deliver() {
            self.server.handle_datagram(&datagram).unwrap();
        }
        for datagram in self.to_client.deliver() {
            self.client.handle_datagram(&datagram).unwrap();
        }

        for segment in self.client.poll_transmit(self.now) {
            if (self.drop_to_server)(&segment) {
                continue;
            }
            self.to_server.send(segment.encode());
        }
        for segment in self.server.poll_transmit(self.now) {
            self.to_client.send(segment.encode());
        }
    }

    /// Step until `done` holds or `max_steps` elapse; returns whether it held.
    pub fn run_until(&mut self, max_steps: usize, mut done: impl FnMut(&Link) -> bool) -> bool {
        for _ in 0..max_steps {
            if done(&*self) {
                return true;
            }
            self.step();
        }
        done(&*self)
    }

    pub fn established(&self) -> bool {
        self.client.connection().state().is_established()
            && self.server.connection().state().is_established()
    }

    pub fn client_received(&self) -> &[u8] {
        self.client.connection().sink()
    }

    pub fn server_received(&self) -> &[u8] {
        self.server.connection().sink()
    }
}
