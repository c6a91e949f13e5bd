use std::net::SocketAddr;
use std::os::fd::RawFd;

use crate::error::Result;

/// Outcome of one non-blocking datagram receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Exactly one datagram of this many bytes was copied into the buffer.
    Datagram(usize),
    /// No datagram is queued on the socket.
    WouldBlock,
    /// A zero-length datagram was consumed. Datagrams have no "close", so
    /// callers treat this like [`ReadStatus::WouldBlock`].
    Empty,
}

/// Outcome of one non-blocking datagram send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The OS accepted this many bytes. For datagrams anything other than the
    /// full span is a protocol anomaly the caller must handle.
    Sent(usize),
    /// The socket send buffer is full.
    WouldBlock,
}

/// What a caller wants to wait for before its next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Connection establishment. Immediately ready for datagram transports.
    Connect,
    /// A datagram is ready to receive.
    Recv,
    /// The socket can accept another datagram.
    Send,
}

/// Readiness interest registered with a [`ReadinessRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

/// Process-side poll set consulted by the outer event loop.
///
/// Transports only record interest here. Sleeping until the OS reports
/// readiness is the event loop's job.
pub trait ReadinessRegistry {
    fn register_interest(&mut self, fd: RawFd, interest: Interest);

    /// Request that the next poll returns without sleeping.
    fn wake_immediately(&mut self);
}

/// Capability interface implemented by every datagram transport variant.
///
/// Framing layers are generic over this trait, so the concrete transport is
/// fixed at construction time and never downcast.
pub trait DatagramTransport {
    /// Human-readable name used in diagnostics (e.g. `udp:10.0.0.1:6653`).
    fn name(&self) -> &str;

    /// The fixed remote peer every datagram is sent to.
    fn peer_addr(&self) -> SocketAddr;

    /// Whether [`DatagramTransport::connect`] has completed.
    fn is_connected(&self) -> bool;

    /// Complete connection establishment. Connectionless transports only flip
    /// a local flag here.
    fn connect(&mut self) -> Result<()>;

    /// Receive at most one datagram into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus>;

    /// Send `buf` as one datagram to the fixed peer.
    fn write(&mut self, buf: &[u8]) -> Result<WriteStatus>;

    /// Register readiness interest for `kind` without blocking.
    fn register_wait(&self, kind: WaitKind, registry: &mut dyn ReadinessRegistry);

    /// Release the underlying socket.
    fn close(self)
    where
        Self: Sized;
}
