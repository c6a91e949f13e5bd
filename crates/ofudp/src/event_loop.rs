use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ofudp_frame::{FramedChannel, Message};
use ofudp_transport::{PollSet, UdpDatagramSocket, WaitKind};

use crate::exit::{frame_error, io_error, CliResult};

/// Longest single sleep, so an interrupt flag is noticed promptly.
const TICK: Duration = Duration::from_millis(200);

/// Single-threaded poll loop driving one channel.
#[derive(Debug, Default)]
pub struct EventLoop {
    poll: PollSet,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// One cycle: register interest, sleep until ready or `timeout`, then
    /// give the channel a chance to flush its pending message.
    pub fn turn(
        &mut self,
        channel: &mut FramedChannel<UdpDatagramSocket>,
        timeout: Duration,
    ) -> CliResult<()> {
        self.poll.clear();
        channel.wait_for(WaitKind::Recv, &mut self.poll);
        channel.wait_for(WaitKind::Send, &mut self.poll);
        self.poll
            .block(Some(timeout.min(TICK)))
            .map_err(|err| io_error("poll failed", err))?;
        channel.pump();
        Ok(())
    }

    /// Wait until the pending message leaves or `deadline` passes.
    ///
    /// Returns whether the channel drained.
    pub fn drain(
        &mut self,
        channel: &mut FramedChannel<UdpDatagramSocket>,
        deadline: Instant,
    ) -> CliResult<bool> {
        while channel.has_pending() {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(false);
            };
            self.turn(channel, remaining)?;
        }
        Ok(true)
    }

    /// Receive the next message.
    ///
    /// Returns `None` when `deadline` passes or `running` is cleared first.
    pub fn next_message(
        &mut self,
        channel: &mut FramedChannel<UdpDatagramSocket>,
        deadline: Option<Instant>,
        running: Option<&AtomicBool>,
    ) -> CliResult<Option<Message>> {
        loop {
            if let Some(message) = channel
                .receive()
                .map_err(|err| frame_error("receive failed", err))?
            {
                return Ok(Some(message));
            }
            if running.is_some_and(|flag| !flag.load(Ordering::SeqCst)) {
                return Ok(None);
            }
            let timeout = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return Ok(None),
                },
                None => TICK,
            };
            self.turn(channel, timeout)?;
        }
    }
}
