use std::fs;
use std::time::{Duration, Instant};

use ofudp_frame::{parse_msg_type, Message, SendOutcome};
use ofudp_transport::DatagramTransport;

use crate::cmd::{open_channel, SendArgs};
use crate::event_loop::EventLoop;
use crate::exit::{
    frame_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT, TRANSPORT_ERROR, USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let msg_type = parse_msg_type(&args.msg_type)
        .ok_or_else(|| CliError::new(USAGE, format!("unknown message type: {}", args.msg_type)))?;
    let body = resolve_body(&args)?;
    let message = Message::build(args.ofp_version, msg_type, args.xid, &body)
        .map_err(|err| frame_error("invalid message", err))?;

    let mut channel = open_channel(&args.endpoint, args.bind, &args.socket)?;
    let mut event_loop = EventLoop::new();
    let deadline = Instant::now() + wait_timeout;

    match channel
        .send(message)
        .map_err(|err| frame_error("send failed", err))?
    {
        SendOutcome::Sent => {}
        SendOutcome::Queued => {
            if !event_loop.drain(&mut channel, deadline)? {
                return Err(CliError::new(TIMEOUT, "send did not drain before timeout"));
            }
            if channel.stats().flushed == 0 {
                return Err(CliError::new(TRANSPORT_ERROR, "pending message was discarded"));
            }
        }
        SendOutcome::Retry => {
            return Err(CliError::new(TRANSPORT_ERROR, "partial datagram send"));
        }
    }
    tracing::info!(msg_type, xid = args.xid, "message sent");

    if args.wait {
        let reply = event_loop.next_message(&mut channel, Some(deadline), None)?;
        match reply {
            Some(reply) => print_message(&reply, channel.get_ref().name(), format),
            None => return Err(CliError::new(TIMEOUT, "no reply before timeout")),
        }
    }

    channel.close();
    Ok(SUCCESS)
}

fn resolve_body(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
