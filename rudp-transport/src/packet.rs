//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning
//!   [`PacketError`] for malformed or truncated input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Flags     |            Window Size        |  Payload Len  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    (cont.)    |                Payload ...                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 13 bytes.
//! seq(4) + ack(4) + flags(1) + window(2) + payload_len(2)
//!
//! There is no checksum; the datagram layer is trusted for integrity.

use thiserror::Error;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Synchronise sequence numbers (handshake).
    pub const SYN: u8 = 0b0000_0001;
    /// Acknowledgement field is valid.
    pub const ACK: u8 = 0b0000_0010;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 13;

/// Largest payload a single segment may carry.
pub const MAX_PAYLOAD: usize = 1012;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 9;
const OFF_PAYLOAD_LEN: usize = 11;

/// Fixed-size segment header.
///
/// Fields are in host byte order; [`Segment::encode`] converts to big-endian
/// on the wire and [`Segment::decode`] converts back.  The payload length is
/// not stored here: it is always `payload.len()` of the owning [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sequence number of this segment.
    pub seq: u32,
    /// Cumulative acknowledgement (next sequence number expected from the peer).
    pub ack: u32,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    /// Advertised receive window in bytes.
    pub window: u16,
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a payload-free control segment (SYN, SYN+ACK or pure ACK).
    pub fn control(seq: u32, ack: u32, flags: u8, window: u16) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags,
                window,
            },
            payload: Vec::new(),
        }
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        self.header.ack
    }

    /// `true` when every bit of `flag` is set in the header.
    #[inline]
    pub fn has(&self, flag: u8) -> bool {
        self.header.flags & flag == flag
    }

    /// Payload length as carried in the header.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of bytes [`encode`](Self::encode) produces for this segment.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialise this segment into a newly allocated byte vector of exactly
    /// `HEADER_LEN + payload.len()` bytes.
    ///
    /// Segments are only ever built with at most [`MAX_PAYLOAD`] bytes, so the
    /// length always fits the 16-bit field.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD);
        let mut buf = vec![0u8; self.encoded_len()];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS] = self.header.flags;
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.header.window.to_be_bytes());
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
            .copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        buf
    }

    /// Parse a [`Segment`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the `payload_len` field exceeds [`MAX_PAYLOAD`], or
    /// - the `payload_len` field claims more bytes than remain in `buf`.
    ///
    /// Bytes after the declared payload are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let seq = read_u32(buf, OFF_SEQ);
        let ack = read_u32(buf, OFF_ACK);
        let flags = buf[OFF_FLAGS];
        let window = read_u16(buf, OFF_WINDOW);
        let payload_len = read_u16(buf, OFF_PAYLOAD_LEN) as usize;

        if payload_len > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(payload_len));
        }
        let available = buf.len() - HEADER_LEN;
        if payload_len > available {
            return Err(PacketError::LengthMismatch {
                declared: payload_len,
                available,
            });
        }

        Ok(Segment {
            header: Header {
                seq,
                ack,
                flags,
                window,
            },
            payload: buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        })
    }
}

#[inline]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

/// A datagram that cannot be parsed as a [`Segment`].
///
/// Every variant is a malformed segment: the datagram is discarded and never
/// reaches the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    #[error("malformed segment: {0} bytes is shorter than the {HEADER_LEN}-byte header")]
    BufferTooShort(usize),
    /// `payload_len` field claims more bytes than the datagram holds.
    #[error("malformed segment: payload_len {declared} exceeds the {available} bytes remaining")]
    LengthMismatch { declared: usize, available: usize },
    /// `payload_len` field is larger than any segment may carry.
    #[error("malformed segment: payload_len {0} exceeds MAX_PAYLOAD ({MAX_PAYLOAD})")]
    PayloadTooLarge(usize),
}
