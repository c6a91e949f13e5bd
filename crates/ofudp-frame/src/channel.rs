use bytes::BytesMut;
use ofudp_transport::{
    parse_active_endpoint, DatagramTransport, ReadStatus, ReadinessRegistry, SocketConfig,
    UdpDatagramSocket, WaitKind, WriteStatus, OFP_DEFAULT_PORT,
};
use tracing::{debug, error, info, info_span, warn, Span};

use crate::codec::{validate_datagram, DatagramCheck, Message, HEADER_SIZE, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// Configuration for a [`FramedChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Largest message accepted for sending and the receive buffer size.
    /// Default and ceiling: 65535. Values below a header are raised to one.
    pub max_frame_size: usize,
    /// Span every event of the channel is recorded under, from construction
    /// on. `None` creates a `udp_channel` span tagged with the peer.
    pub span: Option<Span>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            span: None,
        }
    }
}

impl ChannelConfig {
    fn normalized(mut self) -> Self {
        self.max_frame_size = self.max_frame_size.clamp(HEADER_SIZE, MAX_FRAME_SIZE);
        self
    }
}

/// How a [`FramedChannel::send`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The whole message left in one datagram.
    Sent,
    /// The socket was full; the message is now the pending message and goes
    /// out on a later [`FramedChannel::pump`]. Any earlier pending message
    /// was discarded.
    Queued,
    /// The OS accepted only part of the datagram. The message was discarded.
    Retry,
}

/// Counters describing what a channel has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub received: u64,
    pub sent: u64,
    pub queued: u64,
    /// Pending messages discarded because a newer send replaced them.
    pub superseded: u64,
    /// Pending messages later transmitted by `pump`.
    pub flushed: u64,
    pub dropped_empty: u64,
    pub dropped_short: u64,
    pub dropped_bad_length: u64,
    pub dropped_truncated: u64,
    /// Delivered frames that had trailing bytes cut off.
    pub trimmed_padding: u64,
    pub partial_sends: u64,
    pub send_failures: u64,
}

/// Whole-message channel over a datagram transport.
///
/// Every received datagram is validated as exactly one length-prefixed frame
/// before it is handed out; malformed datagrams are dropped and never fail
/// the channel. On the send side at most one message waits for a blocked
/// socket. A newer blocked send replaces it: under backpressure the last
/// write wins and earlier messages are lost.
pub struct FramedChannel<T> {
    transport: T,
    rx: Option<BytesMut>,
    tx: Option<Message>,
    config: ChannelConfig,
    stats: ChannelStats,
    span: Span,
}

impl FramedChannel<UdpDatagramSocket> {
    /// Resolve `endpoint` (e.g. `udp:192.0.2.1:6653`), open a socket to it
    /// and wrap it in a ready channel.
    ///
    /// Resolution and socket setup are already recorded under the channel's
    /// span; a socket without its own configured span gets a child of it.
    pub fn open(
        endpoint: &str,
        socket_config: &SocketConfig,
        mut config: ChannelConfig,
    ) -> Result<Self> {
        let span = config
            .span
            .take()
            .unwrap_or_else(|| info_span!("udp_channel", endpoint));
        let _enter = span.enter();

        let peer = parse_active_endpoint(endpoint, OFP_DEFAULT_PORT)?;
        let socket = UdpDatagramSocket::open_with_config(peer, socket_config)?;
        let config = ChannelConfig {
            span: Some(span.clone()),
            ..config
        };
        let mut channel = Self::with_config(socket, config);
        channel.connect()?;
        info!(endpoint, %peer, "udp channel opened");
        Ok(channel)
    }
}

impl<T: DatagramTransport> FramedChannel<T> {
    /// Create a channel with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(transport: T, mut config: ChannelConfig) -> Self {
        let span = config
            .span
            .take()
            .unwrap_or_else(|| info_span!("udp_channel", peer = %transport.peer_addr()));
        Self {
            transport,
            rx: None,
            tx: None,
            config: config.normalized(),
            stats: ChannelStats::default(),
            span,
        }
    }

    /// Complete connection setup. Always immediate for datagram transports.
    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect().map_err(Into::into)
    }

    /// Receive the next complete message.
    ///
    /// Returns `Ok(None)` when nothing deliverable is available: no datagram
    /// queued, or the datagram was malformed and dropped. Wait for receive
    /// readiness before trying again. Errors are socket failures and are
    /// fatal for the channel.
    pub fn receive(&mut self) -> Result<Option<Message>> {
        let _enter = self.span.enter();
        let max = self.config.max_frame_size;

        // A parked buffer keeps its full length; only a fresh one is zeroed.
        let mut rx = self.rx.take().unwrap_or_else(|| BytesMut::zeroed(max));

        let received = match self.transport.read(&mut rx) {
            Ok(ReadStatus::Datagram(n)) => n,
            Ok(ReadStatus::WouldBlock) => {
                self.rx = Some(rx);
                return Ok(None);
            }
            Ok(ReadStatus::Empty) => {
                debug!("ignoring empty datagram");
                self.stats.dropped_empty += 1;
                self.rx = Some(rx);
                return Ok(None);
            }
            Err(err) => {
                error!(error = %err, "receive failed");
                self.rx = Some(rx);
                return Err(err.into());
            }
        };

        let frame_len = match validate_datagram(&rx[..received]) {
            DatagramCheck::Complete(len) => len,
            DatagramCheck::Padded { declared, received } => {
                debug!(declared, received, "discarding bytes after frame");
                self.stats.trimmed_padding += 1;
                declared
            }
            DatagramCheck::TooShort { received } => {
                warn!(received, "dropping datagram shorter than a frame header");
                self.stats.dropped_short += 1;
                self.rx = Some(rx);
                return Ok(None);
            }
            DatagramCheck::BadLength { declared } => {
                warn!(declared, "dropping frame with length below header size");
                self.stats.dropped_bad_length += 1;
                self.rx = Some(rx);
                return Ok(None);
            }
            DatagramCheck::Truncated { declared, received } => {
                warn!(declared, received, "dropping frame that claims more bytes than received");
                self.stats.dropped_truncated += 1;
                self.rx = Some(rx);
                return Ok(None);
            }
        };
        rx.truncate(frame_len);

        let message = Message::from_validated(rx);
        let header = message.header();
        debug!(
            msg_type = header.msg_type(),
            length = message.len(),
            xid = header.xid(),
            "received message"
        );
        self.stats.received += 1;
        Ok(Some(message))
    }

    /// Send one message as one datagram.
    ///
    /// `Ok(SendOutcome::Queued)` means the message was accepted for later
    /// delivery, not transmitted. Oversized messages fail before any socket
    /// write.
    pub fn send(&mut self, message: Message) -> Result<SendOutcome> {
        let _enter = self.span.enter();
        let len = message.len();

        if len > self.config.max_frame_size {
            error!(size = len, max = self.config.max_frame_size, "message too large for datagram");
            return Err(FrameError::MessageTooLarge {
                size: len,
                max: self.config.max_frame_size,
            });
        }

        match self.transport.write(message.as_bytes()) {
            Ok(WriteStatus::Sent(n)) if n == len => {
                debug!(bytes = len, "sent message");
                self.stats.sent += 1;
                Ok(SendOutcome::Sent)
            }
            Ok(WriteStatus::Sent(n)) => {
                warn!(sent = n, expected = len, "partial datagram send; message discarded");
                self.stats.partial_sends += 1;
                Ok(SendOutcome::Retry)
            }
            Ok(WriteStatus::WouldBlock) => {
                if let Some(previous) = self.tx.replace(message) {
                    warn!(dropped = previous.len(), "pending message replaced by newer send");
                    self.stats.superseded += 1;
                }
                debug!(bytes = len, "socket full; message pending");
                self.stats.queued += 1;
                Ok(SendOutcome::Queued)
            }
            Err(err) => {
                error!(error = %err, "send failed; message discarded");
                self.stats.send_failures += 1;
                Err(err.into())
            }
        }
    }

    /// Try once to transmit the pending message, if any.
    ///
    /// Call on every event loop cycle. A message that still would block stays
    /// pending; a partial send or socket error discards it.
    pub fn pump(&mut self) {
        let _enter = self.span.enter();
        let Some(pending) = self.tx.take() else {
            return;
        };
        let len = pending.len();

        match self.transport.write(pending.as_bytes()) {
            Ok(WriteStatus::Sent(n)) if n == len => {
                debug!(bytes = len, "flushed pending message");
                self.stats.flushed += 1;
                self.stats.sent += 1;
            }
            Ok(WriteStatus::Sent(n)) => {
                warn!(sent = n, expected = len, "partial flush; pending message discarded");
                self.stats.partial_sends += 1;
            }
            Ok(WriteStatus::WouldBlock) => {
                self.tx = Some(pending);
            }
            Err(err) => {
                error!(error = %err, "flush failed; pending message discarded");
                self.stats.send_failures += 1;
            }
        }
    }

    /// Register the readiness the caller should wait for before the next
    /// attempt.
    ///
    /// Send readiness is only registered while a message is pending, so an
    /// idle channel never wakes the loop on writability.
    pub fn wait_for(&self, kind: WaitKind, registry: &mut dyn ReadinessRegistry) {
        match kind {
            WaitKind::Connect | WaitKind::Recv => self.transport.register_wait(kind, registry),
            WaitKind::Send => {
                if self.tx.is_some() {
                    self.transport.register_wait(kind, registry);
                }
            }
        }
    }

    /// Whether a message is waiting for the socket to drain.
    pub fn has_pending(&self) -> bool {
        self.tx.is_some()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the transport and release both buffer slots.
    pub fn close(self) {
        let Self {
            transport,
            rx,
            tx,
            span,
            ..
        } = self;
        let _enter = span.enter();
        if let Some(pending) = &tx {
            debug!(bytes = pending.len(), "discarding pending message on close");
        }
        drop(rx);
        drop(tx);
        info!(name = transport.name(), "closing channel");
        transport.close();
    }
}

impl<T: DatagramTransport> std::fmt::Debug for FramedChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("name", &self.transport.name())
            .field("pending", &self.tx.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::ErrorKind;
    use std::net::{SocketAddr, UdpSocket};
    use std::os::fd::RawFd;
    use std::time::Duration;

    use std::sync::{Arc, Mutex};

    use ofudp_transport::{Interest, TransportError};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::{Layer, Registry};

    use super::*;
    use crate::types::{ECHO_REPLY, ECHO_REQUEST, HELLO, OFP_VERSION_1_3};

    const FAKE_FD: RawFd = 42;

    /// Records, for each event, the names of its enclosing spans (innermost
    /// first).
    struct SpanScopes(Arc<Mutex<Vec<Vec<&'static str>>>>);

    impl<S> Layer<S> for SpanScopes
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let names = ctx
                .event_scope(event)
                .map(|scope| scope.map(|span| span.name()).collect())
                .unwrap_or_default();
            self.0.lock().unwrap().push(names);
        }
    }

    enum ReadStep {
        Datagram(Vec<u8>),
        WouldBlock,
        Empty,
        Fail(ErrorKind),
    }

    #[derive(Clone, Copy)]
    enum WriteStep {
        Full,
        Partial(usize),
        WouldBlock,
        Fail(ErrorKind),
    }

    /// Transport driven by scripted read and write results.
    ///
    /// Writes default to full success once the script runs out.
    #[derive(Default)]
    struct ScriptedTransport {
        reads: VecDeque<ReadStep>,
        writes: VecDeque<WriteStep>,
        transmitted: Vec<Vec<u8>>,
        write_calls: usize,
        connected: bool,
    }

    impl ScriptedTransport {
        fn reading(steps: Vec<ReadStep>) -> Self {
            Self {
                reads: steps.into(),
                ..Self::default()
            }
        }

        fn writing(steps: Vec<WriteStep>) -> Self {
            Self {
                writes: steps.into(),
                ..Self::default()
            }
        }
    }

    impl DatagramTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        fn peer_addr(&self) -> SocketAddr {
            "192.0.2.1:6653".parse().unwrap()
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn connect(&mut self) -> ofudp_transport::Result<()> {
            self.connected = true;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> ofudp_transport::Result<ReadStatus> {
            match self.reads.pop_front().unwrap_or(ReadStep::WouldBlock) {
                ReadStep::Datagram(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(ReadStatus::Datagram(n))
                }
                ReadStep::WouldBlock => Ok(ReadStatus::WouldBlock),
                ReadStep::Empty => Ok(ReadStatus::Empty),
                ReadStep::Fail(kind) => Err(TransportError::Io(kind.into())),
            }
        }

        fn write(&mut self, buf: &[u8]) -> ofudp_transport::Result<WriteStatus> {
            self.write_calls += 1;
            match self.writes.pop_front().unwrap_or(WriteStep::Full) {
                WriteStep::Full => {
                    self.transmitted.push(buf.to_vec());
                    Ok(WriteStatus::Sent(buf.len()))
                }
                WriteStep::Partial(n) => {
                    self.transmitted.push(buf[..n].to_vec());
                    Ok(WriteStatus::Sent(n))
                }
                WriteStep::WouldBlock => Ok(WriteStatus::WouldBlock),
                WriteStep::Fail(kind) => Err(TransportError::Io(kind.into())),
            }
        }

        fn register_wait(&self, kind: WaitKind, registry: &mut dyn ReadinessRegistry) {
            match kind {
                WaitKind::Connect => registry.wake_immediately(),
                WaitKind::Recv => registry.register_interest(FAKE_FD, Interest::Readable),
                WaitKind::Send => registry.register_interest(FAKE_FD, Interest::Writable),
            }
        }

        fn close(self) {}
    }

    #[derive(Default)]
    struct RecordingRegistry {
        interests: Vec<(RawFd, Interest)>,
        immediate: bool,
    }

    impl ReadinessRegistry for RecordingRegistry {
        fn register_interest(&mut self, fd: RawFd, interest: Interest) {
            self.interests.push((fd, interest));
        }

        fn wake_immediately(&mut self) {
            self.immediate = true;
        }
    }

    fn message(msg_type: u8, xid: u32, body: &[u8]) -> Message {
        Message::build(OFP_VERSION_1_3, msg_type, xid, body).unwrap()
    }

    /// Raw frame whose header declares `declared` total bytes.
    fn frame_declaring(declared: u16, actual: usize) -> Vec<u8> {
        let mut wire = vec![0xAB; actual.max(HEADER_SIZE)];
        wire[0] = OFP_VERSION_1_3;
        wire[1] = HELLO;
        wire[2..4].copy_from_slice(&declared.to_be_bytes());
        wire[4..8].copy_from_slice(&7u32.to_be_bytes());
        wire.truncate(actual);
        wire
    }

    #[test]
    fn send_then_receive_round_trips() {
        for body_len in [0usize, 1, 100, 4096, MAX_FRAME_SIZE - HEADER_SIZE] {
            let body: Vec<u8> = (0..body_len).map(|i| (i % 251) as u8).collect();
            let original = message(ECHO_REQUEST, body_len as u32, &body);

            let mut sender = FramedChannel::new(ScriptedTransport::default());
            assert_eq!(sender.send(original.clone()).unwrap(), SendOutcome::Sent);
            let wire = sender.get_ref().transmitted[0].clone();

            let mut receiver =
                FramedChannel::new(ScriptedTransport::reading(vec![ReadStep::Datagram(wire)]));
            let delivered = receiver.receive().unwrap().expect("message delivered");
            assert_eq!(delivered.as_bytes(), original.as_bytes());
        }
    }

    #[test]
    fn oversized_send_fails_without_writing() {
        let mut wire = frame_declaring(0, MAX_FRAME_SIZE + 1);
        wire[2..4].copy_from_slice(&[0xff, 0xff]);
        let oversized = Message::from_bytes(&wire[..]).unwrap();

        let mut channel = FramedChannel::new(ScriptedTransport::default());
        let err = channel.send(oversized).unwrap_err();

        assert!(matches!(
            err,
            FrameError::MessageTooLarge {
                size: 65536,
                max: 65535
            }
        ));
        assert_eq!(channel.get_ref().write_calls, 0);
        assert!(!channel.has_pending());
    }

    #[test]
    fn configured_limit_applies_to_send() {
        let config = ChannelConfig {
            max_frame_size: 16,
            ..ChannelConfig::default()
        };
        let mut channel = FramedChannel::with_config(ScriptedTransport::default(), config);

        let err = channel.send(message(HELLO, 1, &[0; 9])).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { size: 17, max: 16 }));
        assert_eq!(channel.send(message(HELLO, 1, &[0; 8])).unwrap(), SendOutcome::Sent);
    }

    #[test]
    fn config_is_clamped() {
        let tiny = FramedChannel::with_config(
            ScriptedTransport::default(),
            ChannelConfig {
                max_frame_size: 2,
                ..ChannelConfig::default()
            },
        );
        assert_eq!(tiny.config().max_frame_size, HEADER_SIZE);

        let huge = FramedChannel::with_config(
            ScriptedTransport::default(),
            ChannelConfig {
                max_frame_size: 1 << 20,
                ..ChannelConfig::default()
            },
        );
        assert_eq!(huge.config().max_frame_size, MAX_FRAME_SIZE);
    }

    #[test]
    fn truncated_frame_is_dropped() {
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![
            ReadStep::Datagram(frame_declaring(20, 12)),
        ]));

        assert!(channel.receive().unwrap().is_none());
        assert_eq!(channel.stats().dropped_truncated, 1);
        assert_eq!(channel.stats().received, 0);
    }

    #[test]
    fn padded_frame_is_trimmed_to_declared_length() {
        let wire = frame_declaring(10, 12);
        let mut channel =
            FramedChannel::new(ScriptedTransport::reading(vec![ReadStep::Datagram(wire.clone())]));

        let delivered = channel.receive().unwrap().expect("message delivered");
        assert_eq!(delivered.len(), 10);
        assert_eq!(delivered.as_bytes(), &wire[..10]);
        assert_eq!(delivered.header().length(), 10);
        assert_eq!(channel.stats().trimmed_padding, 1);
    }

    #[test]
    fn short_datagram_is_dropped_without_error() {
        let mut channel =
            FramedChannel::new(ScriptedTransport::reading(vec![ReadStep::Datagram(vec![0x04])]));

        assert!(channel.receive().unwrap().is_none());
        assert_eq!(channel.stats().dropped_short, 1);
        assert_eq!(channel.stats().received, 0);
    }

    #[test]
    fn length_below_header_is_dropped() {
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![
            ReadStep::Datagram(frame_declaring(4, 12)),
        ]));

        assert!(channel.receive().unwrap().is_none());
        assert_eq!(channel.stats().dropped_bad_length, 1);
    }

    #[test]
    fn garbage_does_not_poison_channel() {
        let good = message(ECHO_REPLY, 99, b"alive");
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![
            ReadStep::Datagram(vec![1, 2, 3]),
            ReadStep::Datagram(frame_declaring(500, 40)),
            ReadStep::Empty,
            ReadStep::Datagram(good.as_bytes().to_vec()),
        ]));

        assert!(channel.receive().unwrap().is_none());
        assert!(channel.receive().unwrap().is_none());
        assert!(channel.receive().unwrap().is_none());
        let delivered = channel.receive().unwrap().expect("valid frame after garbage");
        assert_eq!(delivered, good);
        assert_eq!(channel.stats().dropped_empty, 1);
    }

    #[test]
    fn would_block_is_retry() {
        let mut channel =
            FramedChannel::new(ScriptedTransport::reading(vec![ReadStep::WouldBlock]));
        assert!(channel.receive().unwrap().is_none());
    }

    #[test]
    fn parked_receive_buffer_is_reused_as_is() {
        let good = message(HELLO, 5, b"hi");
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![
            ReadStep::WouldBlock,
            ReadStep::Datagram(frame_declaring(500, 40)),
            ReadStep::WouldBlock,
            ReadStep::Datagram(good.as_bytes().to_vec()),
        ]));

        assert!(channel.receive().unwrap().is_none());
        let parked = channel.rx.as_ref().expect("buffer parked after would-block");
        let (ptr, len) = (parked.as_ptr(), parked.len());
        assert_eq!(len, MAX_FRAME_SIZE);

        assert!(channel.receive().unwrap().is_none());
        assert!(channel.receive().unwrap().is_none());
        let parked = channel.rx.as_ref().expect("buffer parked after drop");
        assert_eq!((parked.as_ptr(), parked.len()), (ptr, len));

        // Bytes left over from the dropped datagram never reach the next frame.
        assert_eq!(channel.receive().unwrap(), Some(good));
        assert!(channel.rx.is_none());
    }

    #[test]
    fn read_failure_is_fatal() {
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![ReadStep::Fail(
            ErrorKind::ConnectionRefused,
        )]));

        let err = channel.receive().unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Io(_))));
    }

    #[test]
    fn delivered_messages_are_independent() {
        let first = message(HELLO, 1, b"one");
        let second = message(HELLO, 2, b"two!");
        let mut channel = FramedChannel::new(ScriptedTransport::reading(vec![
            ReadStep::Datagram(first.as_bytes().to_vec()),
            ReadStep::Datagram(second.as_bytes().to_vec()),
        ]));

        let got_first = channel.receive().unwrap().unwrap();
        let got_second = channel.receive().unwrap().unwrap();

        assert_eq!(got_first, first);
        assert_eq!(got_second, second);
        assert_eq!(channel.stats().received, 2);
    }

    #[test]
    fn blocked_sends_keep_only_the_latest() {
        let a = message(HELLO, 1, b"a");
        let b = message(HELLO, 2, b"b");
        let mut channel = FramedChannel::new(ScriptedTransport::writing(vec![
            WriteStep::WouldBlock,
            WriteStep::WouldBlock,
        ]));

        assert_eq!(channel.send(a).unwrap(), SendOutcome::Queued);
        assert_eq!(channel.send(b.clone()).unwrap(), SendOutcome::Queued);
        assert!(channel.has_pending());

        channel.pump();
        assert!(!channel.has_pending());
        assert_eq!(channel.get_ref().transmitted, vec![b.as_bytes().to_vec()]);

        let stats = channel.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.superseded, 1);
        assert_eq!(stats.flushed, 1);
    }

    #[test]
    fn pump_without_pending_writes_nothing() {
        let mut channel = FramedChannel::new(ScriptedTransport::default());
        channel.pump();
        channel.pump();
        channel.pump();
        assert_eq!(channel.get_ref().write_calls, 0);
    }

    #[test]
    fn pump_keeps_message_while_blocked() {
        let msg = message(HELLO, 3, b"later");
        let mut channel = FramedChannel::new(ScriptedTransport::writing(vec![
            WriteStep::WouldBlock,
            WriteStep::WouldBlock,
            WriteStep::WouldBlock,
        ]));

        channel.send(msg.clone()).unwrap();
        channel.pump();
        channel.pump();
        assert!(channel.has_pending());

        channel.pump();
        assert!(!channel.has_pending());
        assert_eq!(channel.get_ref().transmitted, vec![msg.as_bytes().to_vec()]);
    }

    #[test]
    fn pump_discards_on_failure_or_partial() {
        let mut channel = FramedChannel::new(ScriptedTransport::writing(vec![
            WriteStep::WouldBlock,
            WriteStep::Fail(ErrorKind::PermissionDenied),
            WriteStep::WouldBlock,
            WriteStep::Partial(3),
        ]));

        channel.send(message(HELLO, 1, b"x")).unwrap();
        channel.pump();
        assert!(!channel.has_pending());
        assert_eq!(channel.stats().send_failures, 1);

        channel.send(message(HELLO, 2, b"y")).unwrap();
        channel.pump();
        assert!(!channel.has_pending());
        assert_eq!(channel.stats().partial_sends, 1);

        channel.pump();
        assert_eq!(channel.get_ref().write_calls, 4);
    }

    #[test]
    fn partial_send_is_retry_not_success() {
        let mut channel =
            FramedChannel::new(ScriptedTransport::writing(vec![WriteStep::Partial(4)]));

        let outcome = channel.send(message(HELLO, 1, b"body")).unwrap();
        assert_eq!(outcome, SendOutcome::Retry);
        assert!(!channel.has_pending());
        assert_eq!(channel.stats().sent, 0);
    }

    #[test]
    fn send_failure_surfaces_and_discards() {
        let mut channel = FramedChannel::new(ScriptedTransport::writing(vec![WriteStep::Fail(
            ErrorKind::ConnectionReset,
        )]));

        let err = channel.send(message(HELLO, 1, b"")).unwrap_err();
        assert!(matches!(err, FrameError::Transport(_)));
        assert!(!channel.has_pending());
        assert_eq!(channel.stats().send_failures, 1);
    }

    #[test]
    fn send_readiness_only_with_pending_message() {
        let mut channel =
            FramedChannel::new(ScriptedTransport::writing(vec![WriteStep::WouldBlock]));

        let mut idle = RecordingRegistry::default();
        channel.wait_for(WaitKind::Send, &mut idle);
        assert!(idle.interests.is_empty());

        channel.send(message(HELLO, 1, b"")).unwrap();
        let mut busy = RecordingRegistry::default();
        channel.wait_for(WaitKind::Send, &mut busy);
        assert_eq!(busy.interests, vec![(FAKE_FD, Interest::Writable)]);
    }

    #[test]
    fn receive_and_connect_readiness_always_registered() {
        let channel = FramedChannel::new(ScriptedTransport::default());
        let mut registry = RecordingRegistry::default();

        channel.wait_for(WaitKind::Recv, &mut registry);
        channel.wait_for(WaitKind::Connect, &mut registry);

        assert_eq!(registry.interests, vec![(FAKE_FD, Interest::Readable)]);
        assert!(registry.immediate);
    }

    #[test]
    fn connect_delegates_to_transport() {
        let mut channel = FramedChannel::new(ScriptedTransport::default());
        assert!(!channel.get_ref().is_connected());
        channel.connect().unwrap();
        assert!(channel.get_ref().is_connected());
    }

    #[test]
    fn close_with_pending_message() {
        let mut channel =
            FramedChannel::new(ScriptedTransport::writing(vec![WriteStep::WouldBlock]));
        channel.send(message(HELLO, 1, b"")).unwrap();
        channel.close();
    }

    fn receive_until_message(channel: &mut FramedChannel<UdpDatagramSocket>) -> Message {
        for _ in 0..400 {
            if let Some(msg) = channel.receive().unwrap() {
                return msg;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no message arrived");
    }

    #[test]
    fn udp_loopback_exchange() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let endpoint = format!("udp:{}", peer.local_addr().unwrap());

        let mut channel =
            FramedChannel::open(&endpoint, &SocketConfig::default(), ChannelConfig::default())
                .unwrap();
        assert!(channel.get_ref().is_connected());

        let request = message(ECHO_REQUEST, 0x1234, b"ping");
        assert_eq!(channel.send(request.clone()).unwrap(), SendOutcome::Sent);

        let mut buf = [0u8; 2048];
        let (n, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], request.as_bytes());

        // Reply with two trailing pad bytes; they must not be delivered.
        let reply = message(ECHO_REPLY, 0x1234, b"ping");
        let mut wire = reply.as_bytes().to_vec();
        wire.extend_from_slice(&[0, 0]);
        peer.send_to(&[0x04], from).unwrap();
        peer.send_to(&wire, from).unwrap();

        let delivered = receive_until_message(&mut channel);
        assert_eq!(delivered, reply);
        assert_eq!(delivered.header().msg_type(), ECHO_REPLY);
        assert_eq!(channel.stats().dropped_short, 1);

        channel.close();
    }

    #[test]
    fn events_recorded_under_configured_span() {
        let scopes = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default().with(SpanScopes(scopes.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
            let config = ChannelConfig {
                span: Some(tracing::info_span!("controller_link")),
                ..ChannelConfig::default()
            };
            let endpoint = format!("udp:{}", peer.local_addr().unwrap());
            let mut channel =
                FramedChannel::open(&endpoint, &SocketConfig::default(), config).unwrap();

            channel.send(message(HELLO, 1, b"")).unwrap();
            assert!(channel.receive().unwrap().is_none());
            channel.close();
        });

        let scopes = scopes.lock().unwrap();
        assert!(scopes.len() >= 4, "scopes: {scopes:?}");
        for scope in scopes.iter() {
            assert!(scope.contains(&"controller_link"), "scopes: {scopes:?}");
        }
    }

    #[test]
    fn scripted_channel_uses_configured_span() {
        let scopes = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default().with(SpanScopes(scopes.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let config = ChannelConfig {
                span: Some(tracing::info_span!("controller_link")),
                ..ChannelConfig::default()
            };
            let transport = ScriptedTransport::reading(vec![ReadStep::Datagram(vec![1, 2])]);
            let mut channel = FramedChannel::with_config(transport, config);
            assert!(channel.receive().unwrap().is_none());
        });

        let scopes = scopes.lock().unwrap();
        assert_eq!(*scopes, vec![vec!["controller_link"]]);
    }
}
