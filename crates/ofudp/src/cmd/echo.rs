use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ofudp_frame::types::{ECHO_REPLY, ECHO_REQUEST, HELLO};
use ofudp_frame::{msg_type_name, Message, SendOutcome};
use ofudp_transport::DatagramTransport;

use crate::cmd::{install_ctrlc_handler, open_channel, EchoArgs};
use crate::event_loop::EventLoop;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// How long a queued reply may wait for the socket before echo moves on.
const REPLY_DRAIN: Duration = Duration::from_secs(1);

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut channel = open_channel(&args.endpoint, Some(args.bind), &args.socket)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut event_loop = EventLoop::new();
    tracing::info!(peer = channel.get_ref().name(), bind = %args.bind, "echo started");

    while running.load(Ordering::SeqCst) {
        let Some(message) = event_loop.next_message(&mut channel, None, Some(&running))? else {
            break;
        };
        print_message(&message, channel.get_ref().name(), format);

        let Some(reply) = reply_for(&message) else {
            let header = message.header();
            tracing::info!(
                msg_type = msg_type_name(header.msg_type()),
                xid = header.xid(),
                "no reply for message type"
            );
            continue;
        };

        match channel
            .send(reply)
            .map_err(|err| frame_error("reply failed", err))?
        {
            SendOutcome::Sent => {}
            SendOutcome::Queued => {
                if !event_loop.drain(&mut channel, Instant::now() + REPLY_DRAIN)? {
                    tracing::warn!("reply still pending after drain timeout");
                }
            }
            SendOutcome::Retry => tracing::warn!("reply went out partially"),
        }
    }

    tracing::info!(stats = ?channel.stats(), "echo stopped");
    channel.close();
    Ok(SUCCESS)
}

/// Build the answer to `message`, if its type has one.
///
/// Echo requests are answered with the same version, xid and body. Hellos
/// get a bare hello back.
fn reply_for(message: &Message) -> Option<Message> {
    let header = message.header();
    let msg_type = match header.msg_type() {
        ECHO_REQUEST => ECHO_REPLY,
        HELLO => HELLO,
        _ => return None,
    };
    let body = if msg_type == ECHO_REPLY {
        message.body()
    } else {
        &[]
    };
    Message::build(header.version(), msg_type, header.xid(), body).ok()
}
