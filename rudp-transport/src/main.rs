//! Entry point for `rudp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode.  Stdin is the outbound byte stream and stdout the inbound one; all
//! protocol work is delegated to the library.  Logs go to stderr.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use rudp_transport::packet::MAX_PAYLOAD;
use rudp_transport::{ChannelSink, ChannelSource, Config, Connection, Driver, Role, Socket};

/// Reliable ordered byte stream over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    tuning: Tuning,
}

#[derive(Subcommand)]
enum Mode {
    /// Wait for a client and exchange data with it.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
    },
    /// Connect to a server and exchange data with it.
    Client {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
    },
}

#[derive(Args)]
struct Tuning {
    /// Retransmission timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 1000)]
    rto_ms: u64,
    /// Duplicate ACKs that trigger a fast retransmit.
    #[arg(long, global = true, default_value_t = 3)]
    dup_acks: u32,
    /// Driver tick interval in milliseconds.
    #[arg(long, global = true, default_value_t = 10)]
    tick_ms: u64,
}

impl Tuning {
    fn config(&self) -> Config {
        Config {
            rto: Duration::from_millis(self.rto_ms),
            dup_acks: self.dup_acks,
            tick: Duration::from_millis(self.tick_ms.max(1)),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.tuning.config();

    let (role, bind, peer) = match cli.mode {
        Mode::Server { bind } => (Role::Server, bind, None),
        Mode::Client { server, bind } => (Role::Client, bind, Some(server)),
    };

    let socket = Socket::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    log::info!("{role:?} listening on {}", socket.local_addr);

    let (stdin_tx, source) = ChannelSource::new(64);
    let (sink, mut sink_rx) = ChannelSink::new();

    // stdin → engine
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = vec![0u8; MAX_PAYLOAD];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if stdin_tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
        log::debug!("stdin closed");
    });

    // engine → stdout
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = sink_rx.recv().await {
            if let Err(e) = stdout.write_all(&chunk).await {
                log::warn!("stdout write failed: {e}");
                break;
            }
            if let Err(e) = stdout.flush().await {
                log::warn!("stdout flush failed: {e}");
                break;
            }
        }
    });

    let conn = Connection::new(role, &config, source, sink);
    let engine = Driver::new(conn, &config, std::time::Instant::now());
    rudp_transport::run(socket, peer, engine, config.tick)
        .await
        .context("transport failed")?;
    Ok(())
}
