//! `rudp-transport` — a reliable, ordered byte stream implemented over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ByteSource ──read──┐                    ┌──write──▶ ByteSink
//!                     ▼                    │
//!  ┌──────────────────────────────────────────────────┐
//!  │                  Connection                      │
//!  │   handshake FSM · Sender (SendQueue)             │
//!  │                 · Receiver (ReceiveQueue)        │
//!  └──────┬──────────────────────────────▲────────────┘
//!         │ produce_next_segment         │ on_segment_received
//!  ┌──────▼──────────────────────────────┴────────────┐
//!  │   Driver  (RetransmitTimer, fast retransmit)     │
//!  └──────┬──────────────────────────────▲────────────┘
//!         │ Segment::encode              │ Segment::decode
//!  ┌──────▼──────────────────────────────┴────────────┐
//!  │   Socket (tokio UdpSocket)  or  Simulator        │
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format (serialise / deserialise)
//! - [`seq`]        — modular 32-bit sequence-number comparisons
//! - [`buffer`]     — send and receive queues
//! - [`sender`]     — outbound segment production and ACK processing
//! - [`receiver`]   — in-order delivery and out-of-order buffering
//! - [`state`]      — finite-state-machine types
//! - [`connection`] — per-connection engine tying the above together
//! - [`timer`]      — retransmission timer
//! - [`driver`]     — transmission scheduling and the async run loop
//! - [`socket`]     — async UDP socket abstraction
//! - [`simulator`]  — in-memory lossy link for deterministic tests
//! - [`app`]        — application byte source and sink
//! - [`config`]     — protocol constants and tunables

pub mod app;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod driver;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use app::{ByteSink, ByteSource, ChannelSink, ChannelSource};
pub use config::Config;
pub use connection::Connection;
pub use driver::{run, Driver};
pub use packet::{PacketError, Segment};
pub use socket::{Socket, SocketError};
pub use state::{ConnectionState, Role};
