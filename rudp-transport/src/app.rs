//! Application-facing byte source and sink.
//!
//! The engine pulls outbound bytes from a [`ByteSource`] and pushes in-order
//! inbound bytes into a [`ByteSink`].  Both are plain synchronous traits so
//! the engine never awaits; async producers and consumers attach through the
//! channel-backed [`ChannelSource`] and [`ChannelSink`].

use std::collections::VecDeque;
use std::io;

use tokio::sync::mpsc;

/// Non-blocking pull interface for outbound application data.
pub trait ByteSource {
    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// `Ok(0)` and [`io::ErrorKind::WouldBlock`] both mean "nothing ready
    /// now"; the engine simply tries again on a later tick.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Push interface for in-order inbound application data.  Always accepts.
pub trait ByteSink {
    fn write(&mut self, bytes: &[u8]);
}

impl ByteSource for VecDeque<u8> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        for (dst, src) in buf[..n].iter_mut().zip(self.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl ByteSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for Box<T> {
    fn write(&mut self, bytes: &[u8]) {
        (**self).write(bytes)
    }
}

// ---------------------------------------------------------------------------
// Channel adapters
// ---------------------------------------------------------------------------

/// [`ByteSource`] fed by an mpsc channel of byte chunks.
///
/// Chunks are re-sliced to whatever size the engine asks for; a partially
/// consumed chunk is kept for the next read.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl ChannelSource {
    /// Create a source and the sender half the application writes into.
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                rx,
                pending: VecDeque::new(),
                closed: false,
            },
        )
    }

    /// `true` once every sender is dropped and all queued bytes were read.
    pub fn is_exhausted(&self) -> bool {
        self.closed && self.pending.is_empty()
    }
}

impl ByteSource for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.len() < buf.len() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        ByteSource::read(&mut self.pending, buf)
    }
}

/// [`ByteSink`] that forwards every delivered chunk to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    /// Create a sink and the receiver half the application reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ByteSink for ChannelSink {
    fn write(&mut self, bytes: &[u8]) {
        if self.tx.send(bytes.to_vec()).is_err() {
            log::warn!("[app] sink receiver dropped; discarding {} bytes", bytes.len());
        }
    }
}
