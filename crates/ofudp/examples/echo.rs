//! Minimal echo responder: answers echo requests from one peer.
//!
//! Run with:
//!   cargo run --example echo -- udp:127.0.0.1:6653 127.0.0.1:6654
//!
//! In another terminal:
//!   cargo run --features cli -- send udp:127.0.0.1:6654 --bind 127.0.0.1:6653 \
//!     --type echo-request --data ping --wait

use std::net::SocketAddr;
use std::time::Duration;

use ofudp::frame::types::{ECHO_REPLY, ECHO_REQUEST};
use ofudp::frame::{msg_type_name, ChannelConfig, FramedChannel, Message};
use ofudp::transport::{PollSet, SocketConfig, WaitKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| "udp:127.0.0.1:6653".to_string());
    let bind: SocketAddr = args.next().as_deref().unwrap_or("127.0.0.1:6654").parse()?;

    let socket_config = SocketConfig {
        bind: Some(bind),
        ..SocketConfig::default()
    };
    let mut channel = FramedChannel::open(&endpoint, &socket_config, ChannelConfig::default())?;
    eprintln!("Echoing for {endpoint} on {bind}");

    let mut poll = PollSet::new();
    loop {
        poll.clear();
        channel.wait_for(WaitKind::Recv, &mut poll);
        channel.wait_for(WaitKind::Send, &mut poll);
        poll.block(Some(Duration::from_secs(1)))?;
        channel.pump();

        while let Some(message) = channel.receive()? {
            let header = message.header();
            eprintln!(
                "Received {} xid {} ({} bytes)",
                msg_type_name(header.msg_type()),
                header.xid(),
                message.len()
            );
            if header.msg_type() == ECHO_REQUEST {
                let reply =
                    Message::build(header.version(), ECHO_REPLY, header.xid(), message.body())?;
                channel.send(reply)?;
            }
        }
    }
}
