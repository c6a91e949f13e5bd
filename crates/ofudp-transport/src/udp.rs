use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, info_span, warn, Span};

use crate::error::{Result, TransportError};
use crate::traits::{
    DatagramTransport, Interest, ReadStatus, ReadinessRegistry, WaitKind, WriteStatus,
};

/// Socket-level options applied when a [`UdpDatagramSocket`] is opened.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Local address to bind before associating the peer. `None` lets the OS
    /// pick an ephemeral port on association.
    pub bind: Option<SocketAddr>,
    /// Set `SO_REUSEADDR`. Default: true.
    pub reuse_address: bool,
    /// `SO_RCVBUF` size in bytes. `None` keeps the OS default.
    pub recv_buffer_size: Option<usize>,
    /// `SO_SNDBUF` size in bytes. `None` keeps the OS default.
    pub send_buffer_size: Option<usize>,
    /// Span every event of the socket is recorded under, from socket creation
    /// on. `None` creates a `udp_stream` span tagged with the peer.
    pub span: Option<Span>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            bind: None,
            reuse_address: true,
            recv_buffer_size: None,
            send_buffer_size: None,
            span: None,
        }
    }
}

/// Non-blocking UDP socket bound to a single fixed peer.
///
/// Exposes raw datagram read/write with no message semantics. The socket is
/// owned exclusively and closed exactly once, when the adapter is closed or
/// dropped.
pub struct UdpDatagramSocket {
    socket: UdpSocket,
    name: String,
    peer: SocketAddr,
    /// The peer was accepted as the socket's default destination.
    associated: bool,
    connected: bool,
    last_source: Option<SocketAddr>,
    span: Span,
}

impl UdpDatagramSocket {
    /// Open a non-blocking datagram socket to `peer` with default options.
    pub fn open(peer: SocketAddr) -> Result<Self> {
        Self::open_with_config(peer, &SocketConfig::default())
    }

    /// Open a non-blocking datagram socket to `peer`.
    ///
    /// Failure to associate the peer as the default destination is logged and
    /// tolerated: every send can still target the peer explicitly.
    pub fn open_with_config(peer: SocketAddr, config: &SocketConfig) -> Result<Self> {
        let name = format!("udp:{peer}");
        let span = config
            .span
            .clone()
            .unwrap_or_else(|| info_span!("udp_stream", peer = %peer));
        let _enter = span.enter();

        let socket = Socket::new(Domain::for_address(peer), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|source| creation_error(peer, source))?;
        socket.set_nonblocking(true).map_err(|source| {
            error!(error = %source, "failed to set non-blocking mode");
            TransportError::SocketCreation { source }
        })?;

        if config.reuse_address {
            if let Err(err) = socket.set_reuse_address(true) {
                warn!(error = %err, "failed to set SO_REUSEADDR");
            }
        }
        if let Some(size) = config.recv_buffer_size {
            if let Err(err) = socket.set_recv_buffer_size(size) {
                warn!(error = %err, size, "failed to set receive buffer size");
            }
        }
        if let Some(size) = config.send_buffer_size {
            if let Err(err) = socket.set_send_buffer_size(size) {
                warn!(error = %err, size, "failed to set send buffer size");
            }
        }

        if let Some(local) = config.bind {
            socket.bind(&local.into()).map_err(|err| {
                error!(error = %err, %local, "failed to bind local address");
                TransportError::Io(err)
            })?;
        }

        let associated = match socket.connect(&peer.into()) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "datagram connect() failed; sending explicitly to peer");
                false
            }
        };

        let socket: UdpSocket = socket.into();
        info!(fd = socket.as_raw_fd(), "datagram socket opened");
        drop(_enter);

        Ok(Self {
            socket,
            name,
            peer,
            associated,
            connected: false,
            last_source: None,
            span,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    /// Source address of the most recently received datagram.
    pub fn last_source(&self) -> Option<SocketAddr> {
        self.last_source
    }

    /// Whether the OS accepted the peer as default destination.
    pub fn is_associated(&self) -> bool {
        self.associated
    }
}

impl DatagramTransport for UdpDatagramSocket {
    fn name(&self) -> &str {
        &self.name
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus> {
        let _enter = self.span.enter();
        loop {
            match self.socket.recv_from(buf) {
                Ok((0, source)) => {
                    self.last_source = Some(source);
                    debug!(%source, "received empty datagram");
                    return Ok(ReadStatus::Empty);
                }
                Ok((n, source)) => {
                    self.last_source = Some(source);
                    debug!(%source, bytes = n, "received datagram");
                    return Ok(ReadStatus::Datagram(n));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Ok(ReadStatus::WouldBlock)
                }
                Err(err) => {
                    error!(error = %err, "datagram receive failed");
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<WriteStatus> {
        let _enter = self.span.enter();
        loop {
            let sent = if self.associated {
                self.socket.send(buf)
            } else {
                self.socket.send_to(buf, self.peer)
            };
            match sent {
                Ok(n) => {
                    debug!(bytes = n, "sent datagram");
                    return Ok(WriteStatus::Sent(n));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Ok(WriteStatus::WouldBlock)
                }
                Err(err) => {
                    error!(error = %err, "datagram send failed");
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    fn register_wait(&self, kind: WaitKind, registry: &mut dyn ReadinessRegistry) {
        match kind {
            WaitKind::Connect => registry.wake_immediately(),
            WaitKind::Recv => registry.register_interest(self.as_raw_fd(), Interest::Readable),
            WaitKind::Send => registry.register_interest(self.as_raw_fd(), Interest::Writable),
        }
    }

    fn close(self) {
        let _enter = self.span.enter();
        info!(fd = self.socket.as_raw_fd(), "closing datagram socket");
    }
}

impl AsRawFd for UdpDatagramSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl std::fmt::Debug for UdpDatagramSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpDatagramSocket")
            .field("peer", &self.peer)
            .field("fd", &self.socket.as_raw_fd())
            .field("associated", &self.associated)
            .field("connected", &self.connected)
            .finish()
    }
}

fn creation_error(peer: SocketAddr, source: std::io::Error) -> TransportError {
    error!(error = %source, "failed to create datagram socket");
    if source.raw_os_error() == Some(libc::EAFNOSUPPORT) {
        TransportError::AddressFamily { addr: peer, source }
    } else {
        TransportError::SocketCreation { source }
    }
}
