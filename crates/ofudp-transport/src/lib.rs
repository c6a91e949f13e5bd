//! Non-blocking datagram transport for message-oriented protocols.
//!
//! Provides the lowest layer of ofudp:
//! - [`UdpDatagramSocket`], a non-blocking UDP socket bound to one fixed peer
//! - [`DatagramTransport`], the capability interface framing layers build on
//! - [`ReadinessRegistry`] and [`PollSet`], the readiness-wait contract
//! - [`parse_active_endpoint`], `udp:<host>:<port>` resolution
//!
//! Nothing here knows about message framing. One read is one datagram, one
//! write is one datagram. Only Unix targets are supported.

pub mod endpoint;
pub mod error;

#[cfg(unix)]
pub mod poll;
#[cfg(unix)]
pub mod traits;
#[cfg(unix)]
pub mod udp;

pub use endpoint::{parse_active_endpoint, OFP_DEFAULT_PORT};
pub use error::{Result, TransportError};

#[cfg(unix)]
pub use poll::PollSet;
#[cfg(unix)]
pub use traits::{
    DatagramTransport, Interest, ReadStatus, ReadinessRegistry, WaitKind, WriteStatus,
};
#[cfg(unix)]
pub use udp::{SocketConfig, UdpDatagramSocket};
