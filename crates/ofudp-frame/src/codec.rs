use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: version (1) + type (1) + length (2) + xid (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest total message length the 16-bit length field can express.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Byte offset of the big-endian total-length field.
const LENGTH_OFFSET: usize = 2;

/// Read-only view of the header at the front of a frame.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────────┬─────────────┬─────────────┬──────────────────┐
/// │ Version   │ Type     │ Length      │ Xid         │ Body             │
/// │ (1B)      │ (1B)     │ (2B BE)     │ (4B BE)     │ (Length - 8 B)   │
/// └───────────┴──────────┴─────────────┴─────────────┴──────────────────┘
/// ```
/// Length counts the whole message, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameHeader<'a> {
    /// View the header of `bytes`, or `None` if it is shorter than a header.
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        bytes.get(..HEADER_SIZE).map(|bytes| Self { bytes })
    }

    pub fn version(&self) -> u8 {
        self.bytes[0]
    }

    pub fn msg_type(&self) -> u8 {
        self.bytes[1]
    }

    /// Declared total message length in bytes.
    pub fn length(&self) -> usize {
        u16::from_be_bytes([self.bytes[LENGTH_OFFSET], self.bytes[LENGTH_OFFSET + 1]]) as usize
    }

    pub fn xid(&self) -> u32 {
        u32::from_be_bytes([self.bytes[4], self.bytes[5], self.bytes[6], self.bytes[7]])
    }
}

/// Result of checking one received datagram against its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramCheck {
    /// The datagram is exactly one frame of this length.
    Complete(usize),
    /// Fewer bytes than a header.
    TooShort { received: usize },
    /// The header declares a total length smaller than the header itself.
    BadLength { declared: usize },
    /// The header claims more bytes than arrived. The rest can never arrive.
    Truncated { declared: usize, received: usize },
    /// Trailing bytes follow the declared frame; the frame is `declared` long.
    Padded { declared: usize, received: usize },
}

/// Classify a received datagram as a frame.
pub fn validate_datagram(datagram: &[u8]) -> DatagramCheck {
    let received = datagram.len();
    let Some(header) = FrameHeader::parse(datagram) else {
        return DatagramCheck::TooShort { received };
    };

    let declared = header.length();
    if declared < HEADER_SIZE {
        DatagramCheck::BadLength { declared }
    } else if declared > received {
        DatagramCheck::Truncated { declared, received }
    } else if declared < received {
        DatagramCheck::Padded { declared, received }
    } else {
        DatagramCheck::Complete(declared)
    }
}

/// One complete protocol message.
///
/// Messages delivered by a channel own the receive buffer they were read
/// into; nothing inside the channel aliases them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    buf: BytesMut,
}

impl Message {
    /// Encode a message with a correct length field.
    pub fn build(version: u8, msg_type: u8, xid: u32, body: &[u8]) -> Result<Self> {
        let total = HEADER_SIZE + body.len();
        if total > MAX_FRAME_SIZE {
            return Err(FrameError::MessageTooLarge {
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u8(version);
        buf.put_u8(msg_type);
        buf.put_u16(total as u16);
        buf.put_u32(xid);
        buf.put_slice(body);
        Ok(Self { buf })
    }

    /// Wrap already-encoded bytes for sending.
    ///
    /// Only the minimum length is checked; the bytes go out as given.
    pub fn from_bytes(bytes: impl Into<BytesMut>) -> Result<Self> {
        let buf = bytes.into();
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::InvalidMessage(format!(
                "{} bytes is shorter than the {HEADER_SIZE}-byte header",
                buf.len()
            )));
        }
        Ok(Self { buf })
    }

    /// Take ownership of a validated receive buffer.
    pub(crate) fn from_validated(buf: BytesMut) -> Self {
        Self { buf }
    }

    /// Header view. Every `Message` is at least a header long.
    pub fn header(&self) -> FrameHeader<'_> {
        FrameHeader {
            bytes: &self.buf[..HEADER_SIZE],
        }
    }

    /// Bytes following the header.
    pub fn body(&self) -> &[u8] {
        &self.buf[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze into an immutable byte handle.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
