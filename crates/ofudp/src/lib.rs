//! OpenFlow message transport over UDP datagrams.
//!
//! ofudp carries whole protocol messages over a connectionless, unreliable
//! datagram socket while looking like a buffered, non-blocking connection to
//! the protocol client above it.
//!
//! # Crate Structure
//!
//! - [`transport`]: Non-blocking UDP socket bound to one peer, readiness
//!   registration, endpoint resolution
//! - [`frame`]: Validated whole-message channel with single-slot send
//!   backpressure
//!
//! # Example
//!
//! ```no_run
//! use ofudp::frame::{ChannelConfig, FramedChannel, Message, OFP_VERSION_1_3};
//! use ofudp::frame::types::HELLO;
//! use ofudp::transport::SocketConfig;
//!
//! let mut channel = FramedChannel::open(
//!     "udp:127.0.0.1:6653",
//!     &SocketConfig::default(),
//!     ChannelConfig::default(),
//! )?;
//! channel.send(Message::build(OFP_VERSION_1_3, HELLO, 1, &[])?)?;
//! # Ok::<(), ofudp::frame::FrameError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use ofudp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ofudp_frame::*;
}
