//! Unix socket transport for the control channel.
//!
//! A single-threaded reactor: the [`Server`] registers its listening socket
//! and every accepted client with an [`EventLoop`], and the caller feeds
//! ready tokens back into [`Server::handle_event`].

mod connection;
mod errors;
mod listener;
mod reactor;
mod sys;
#[cfg(test)]
mod test_utils;

pub use self::connection::{ClientConnection, ConnectionState};
pub use self::errors::{DisconnectReason, ProtocolError, ServerError};
pub use self::listener::{LISTENER_TOKEN, Server};
pub use self::reactor::{EventLoop, PollEventLoop, Token};
#[cfg(test)]
pub(crate) use self::test_utils::{ServerHarness, frame};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
