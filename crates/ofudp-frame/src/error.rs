use ofudp_transport::TransportError;

/// Errors that can occur on a framed message channel.
///
/// Malformed datagrams from the peer are never errors; they are dropped and
/// reported as "nothing available yet".
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A datagram cannot carry the message in one piece.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A locally supplied message is not a well-formed frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The underlying socket failed. The channel should be closed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
