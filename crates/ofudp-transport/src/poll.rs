use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::traits::{Interest, ReadinessRegistry};

/// A `poll(2)`-backed [`ReadinessRegistry`] for single-threaded event loops.
///
/// Interests accumulate between calls to [`PollSet::block`]; registering the
/// same descriptor twice merges the requested events. After `block` returns,
/// [`PollSet::is_ready`] answers per-descriptor readiness until the set is
/// cleared for the next cycle.
#[derive(Default)]
pub struct PollSet {
    fds: Vec<libc::pollfd>,
    immediate: bool,
}

impl PollSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any descriptor or immediate wake has been registered.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty() && !self.immediate
    }

    /// Drop all registrations and readiness results.
    pub fn clear(&mut self) {
        self.fds.clear();
        self.immediate = false;
    }

    /// Sleep until a registered descriptor is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. An immediate wake turns the wait into a
    /// non-blocking check. Returns the number of ready descriptors.
    pub fn block(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let timeout_ms = if self.immediate {
            0
        } else {
            timeout_millis(timeout)
        };

        for pfd in &mut self.fds {
            pfd.revents = 0;
        }

        loop {
            // SAFETY: `fds` is a valid, exclusively borrowed slice of `pollfd`
            // structs and its length is passed alongside the pointer.
            let rc = unsafe {
                libc::poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as libc::nfds_t,
                    timeout_ms,
                )
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Whether `fd` reported `interest` in the last [`PollSet::block`].
    ///
    /// Error and hang-up conditions count as ready so the caller's next
    /// read or write surfaces them.
    pub fn is_ready(&self, fd: RawFd, interest: Interest) -> bool {
        self.fds
            .iter()
            .find(|pfd| pfd.fd == fd)
            .is_some_and(|pfd| {
                pfd.revents & (events_for(interest) | libc::POLLERR | libc::POLLHUP) != 0
            })
    }

    /// Events currently requested for `fd`.
    pub fn registered(&self, fd: RawFd) -> Option<i16> {
        self.fds.iter().find(|pfd| pfd.fd == fd).map(|pfd| pfd.events)
    }
}

impl std::fmt::Debug for PollSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fds: Vec<(RawFd, i16)> = self.fds.iter().map(|pfd| (pfd.fd, pfd.events)).collect();
        f.debug_struct("PollSet")
            .field("fds", &fds)
            .field("immediate", &self.immediate)
            .finish()
    }
}

impl ReadinessRegistry for PollSet {
    fn register_interest(&mut self, fd: RawFd, interest: Interest) {
        let events = events_for(interest);
        match self.fds.iter_mut().find(|pfd| pfd.fd == fd) {
            Some(pfd) => pfd.events |= events,
            None => self.fds.push(libc::pollfd {
                fd,
                events,
                revents: 0,
            }),
        }
    }

    fn wake_immediately(&mut self) {
        self.immediate = true;
    }
}

fn events_for(interest: Interest) -> i16 {
    match interest {
        Interest::Readable => libc::POLLIN,
        Interest::Writable => libc::POLLOUT,
    }
}

fn timeout_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let ms = t.as_millis();
            // Round sub-millisecond waits up so they do not spin.
            let ms = if ms == 0 && !t.is_zero() { 1 } else { ms };
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
