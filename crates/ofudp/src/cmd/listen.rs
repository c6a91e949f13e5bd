use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ofudp_frame::parse_msg_type;
use ofudp_transport::DatagramTransport;

use crate::cmd::{install_ctrlc_handler, open_channel, ListenArgs};
use crate::event_loop::EventLoop;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let filter = parse_type_filter(args.types.as_deref())?;
    let mut channel = open_channel(&args.endpoint, Some(args.bind), &args.socket)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut event_loop = EventLoop::new();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(message) = event_loop.next_message(&mut channel, None, Some(&running))? else {
            break;
        };

        if let Some(types) = &filter {
            if !types.contains(&message.header().msg_type()) {
                continue;
            }
        }

        let source = channel
            .get_ref()
            .last_source()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| channel.get_ref().name().to_string());
        print_message(&message, &source, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    tracing::debug!(printed, stats = ?channel.stats(), "listen finished");
    channel.close();
    Ok(SUCCESS)
}

fn parse_type_filter(types: Option<&[String]>) -> CliResult<Option<Vec<u8>>> {
    let Some(types) = types else {
        return Ok(None);
    };
    types
        .iter()
        .map(|name| {
            parse_msg_type(name)
                .ok_or_else(|| CliError::new(USAGE, format!("unknown message type: {name}")))
        })
        .collect::<CliResult<Vec<u8>>>()
        .map(Some)
}
