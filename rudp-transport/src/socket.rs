//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`Segment`] instead of raw bytes.  All protocol logic lives elsewhere;
//! this module owns only byte I/O.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{PacketError, Segment, HEADER_LEN, MAX_PAYLOAD};

/// Largest datagram a conforming peer sends.
const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    /// The received datagram could not be decoded as a segment.
    #[error("segment decode error: {0}")]
    Packet(#[from] PacketError),
}

impl SocketError {
    /// `true` for ICMP-induced errors some platforms surface on the next
    /// `recv_from` after a send to a closed port.
    pub fn is_transient(&self) -> bool {
        match self {
            SocketError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
            ),
            SocketError::Packet(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, segment-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (after the OS assigns an ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        log::debug!("[driver] bound UDP socket on {local_addr}");
        Ok(Self { local_addr, inner })
    }

    /// Encode `segment` and send it as a single datagram to `dest`.
    pub async fn send_to(&self, segment: &Segment, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = segment.encode();
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Segment`].
    ///
    /// Datagrams that fail to decode come back as [`SocketError::Packet`];
    /// the caller decides whether to keep reading.
    pub async fn recv_from(&self) -> Result<(Segment, SocketAddr), SocketError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let segment = Segment::decode(&buf[..n])?;
        Ok((segment, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::flags;

    #[tokio::test]
    async fn loopback_round_trip() {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let mut seg = Segment::control(10, 20, flags::ACK, 300);
        seg.payload = b"ping".to_vec();
        a.send_to(&seg, b.local_addr).await.unwrap();

        let (got, from) = b.recv_from().await.unwrap();
        assert_eq!(got, seg);
        assert_eq!(from, a.local_addr);
    }

    #[tokio::test]
    async fn short_datagram_is_packet_error() {
        let a = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        a.send_to(&[1, 2, 3], b.local_addr).await.unwrap();

        let err = b.recv_from().await.unwrap_err();
        assert!(matches!(err, SocketError::Packet(PacketError::BufferTooShort(3))));
        assert!(err.is_transient());
    }

    #[test]
    fn refused_is_transient_but_other_io_is_fatal() {
        let refused = SocketError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(refused.is_transient());
        let denied = SocketError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!denied.is_transient());
    }
}
