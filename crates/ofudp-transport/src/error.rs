use std::net::SocketAddr;

/// Errors that can occur in datagram transport operations.
///
/// Would-block and empty datagrams are not errors; they are reported through
/// [`ReadStatus`](crate::ReadStatus) and [`WriteStatus`](crate::WriteStatus).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The OS refused to create the datagram socket.
    #[error("failed to create datagram socket: {source}")]
    SocketCreation { source: std::io::Error },

    /// The peer's address family is not supported on this host.
    #[error("unsupported address family for {addr}: {source}")]
    AddressFamily {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The endpoint string could not be turned into a socket address.
    #[error("cannot resolve endpoint {endpoint:?}: {reason}")]
    Resolve { endpoint: String, reason: String },

    /// An unrecoverable I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
