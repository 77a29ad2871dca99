//! Readiness multiplexing for the listening socket and its clients.
//!
//! The server never blocks on a read. It asks an [`EventLoop`] to watch each
//! descriptor and reacts when the loop reports the descriptor readable.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::debug;

use super::TRANSPORT_TARGET;
use super::sys;

/// Identifies a watched descriptor when the loop reports readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

/// Registration surface the server uses to (un)subscribe descriptors.
pub trait EventLoop {
    /// Starts reporting readability, hang-up and error conditions for `fd`.
    fn watch(&mut self, fd: RawFd, token: Token) -> io::Result<()>;

    /// Stops reporting events for `fd`. Unknown descriptors are ignored.
    fn unwatch(&mut self, fd: RawFd);
}

#[derive(Debug, Clone, Copy)]
struct Watched {
    fd: RawFd,
    token: Token,
}

/// Level-triggered [`EventLoop`] built on `poll(2)`.
#[derive(Debug, Default)]
pub struct PollEventLoop {
    watched: Vec<Watched>,
}

impl PollEventLoop {
    /// Creates a loop that watches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of watched descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.watched.len()
    }

    /// Returns `true` when nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Waits for readiness and returns the tokens of ready descriptors.
    ///
    /// `None` waits indefinitely. An interrupted wait yields no tokens so the
    /// caller can re-check its shutdown flag.
    ///
    /// # Errors
    ///
    /// Propagates any other failure from `poll(2)`.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Token>> {
        let mut fds: Vec<libc::pollfd> = self
            .watched
            .iter()
            .map(|watched| libc::pollfd {
                fd: watched.fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        match sys::poll(&mut fds, timeout_millis(timeout)) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(error) => return Err(error),
        }

        let ready_mask = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
        Ok(fds
            .iter()
            .zip(&self.watched)
            .filter(|(pollfd, _)| pollfd.revents & ready_mask != 0)
            .map(|(_, watched)| watched.token)
            .collect())
    }
}

impl EventLoop for PollEventLoop {
    fn watch(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        if self.watched.iter().any(|watched| watched.fd == fd) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("descriptor {fd} is already watched"),
            ));
        }
        debug!(target: TRANSPORT_TARGET, fd, token = token.0, "watching descriptor");
        self.watched.push(Watched { fd, token });
        Ok(())
    }

    fn unwatch(&mut self, fd: RawFd) {
        self.watched.retain(|watched| watched.fd != fd);
        debug!(target: TRANSPORT_TARGET, fd, "descriptor no longer watched");
    }
}

fn timeout_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(duration) => libc::c_int::try_from(duration.as_millis()).unwrap_or(libc::c_int::MAX),
    }
}
