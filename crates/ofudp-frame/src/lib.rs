//! Whole-message channel over a datagram transport.
//!
//! Each datagram carries exactly one message framed with an 8-byte header:
//! - 1-byte protocol version
//! - 1-byte message type
//! - 2-byte big-endian total length (header included)
//! - 4-byte big-endian transaction id
//!
//! Received datagrams are validated before delivery; callers only ever see
//! complete frames. Sends that hit a full socket wait in a single pending
//! slot until [`FramedChannel::pump`] flushes them.

pub mod channel;
pub mod codec;
pub mod error;
pub mod types;

pub use channel::{ChannelConfig, ChannelStats, FramedChannel, SendOutcome};
pub use codec::{
    validate_datagram, DatagramCheck, FrameHeader, Message, HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use error::{FrameError, Result};
pub use types::{msg_type_name, parse_msg_type, OFP_VERSION_1_3};
