//! Control socket server driven by an [`EventLoop`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use sockctl_proto::HEADER_LEN;

use super::TRANSPORT_TARGET;
use super::connection::{ClientConnection, ConnectionState};
use super::errors::{DisconnectReason, ServerError};
use super::reactor::{EventLoop, Token};
use crate::dispatch::MethodRegistry;

/// Token under which the listening socket is watched.
pub const LISTENER_TOKEN: Token = Token(0);

/// Listening socket, its connected clients and the method registry.
///
/// The server owns no thread. The caller polls its event loop and forwards
/// every ready token to [`Server::handle_event`].
///
/// Call [`Server::shutdown`] with the same event loop before dropping the
/// server. `Drop` cannot reach the loop: it only unlinks the socket file,
/// and any descriptors still watched stay registered after they close.
#[derive(Debug)]
pub struct Server {
    listener: UnixListener,
    path: PathBuf,
    registry: MethodRegistry,
    clients: HashMap<Token, ClientConnection>,
    next_token: usize,
    max_message_len: usize,
    closed: bool,
}

impl Server {
    /// Binds the control socket at `path` and registers it with `event_loop`.
    ///
    /// Any file already present at `path` is removed first.
    /// `max_message_len` bounds a whole request frame, header included.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the ceiling is unusable, the stale file
    /// cannot be removed, binding fails, or the event loop refuses the
    /// listener. The socket file is removed again on every failure after
    /// binding.
    pub fn create(
        path: impl Into<PathBuf>,
        registry: MethodRegistry,
        max_message_len: usize,
        event_loop: &mut dyn EventLoop,
    ) -> Result<Self, ServerError> {
        if max_message_len <= HEADER_LEN {
            return Err(ServerError::InvalidFrameCeiling { max_message_len });
        }
        let path = path.into();
        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(|source| ServerError::Bind {
            path: path.display().to_string(),
            source,
        })?;
        if let Err(source) = listener.set_nonblocking(true) {
            cleanup_socket_file(&path);
            return Err(ServerError::NonBlocking { source });
        }
        if let Err(source) = event_loop.watch(listener.as_raw_fd(), LISTENER_TOKEN) {
            cleanup_socket_file(&path);
            return Err(ServerError::Watch { source });
        }

        info!(
            target: TRANSPORT_TARGET,
            path = %path.display(),
            max_message_len,
            "control socket listening"
        );
        Ok(Self {
            listener,
            path,
            registry,
            clients: HashMap::new(),
            next_token: LISTENER_TOKEN.0 + 1,
            max_message_len,
            closed: false,
        })
    }

    /// Path of the bound socket.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Method registry consulted for every request.
    #[must_use]
    pub const fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Registers a method handler. See [`MethodRegistry::register_method`].
    pub fn register_method<F>(&mut self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.registry.register_method(name, handler)
    }

    /// Removes a method handler. See [`MethodRegistry::unregister_method`].
    pub fn unregister_method(&mut self, name: &str) -> bool {
        self.registry.unregister_method(name)
    }

    /// Invokes the handler registered under `name`.
    #[must_use]
    pub fn dispatch(&self, name: &str, data: Value) -> Value {
        self.registry.dispatch(name, data)
    }

    /// Reacts to readiness reported for `token`.
    ///
    /// The listener token accepts one pending connection; a client token
    /// drains that client's queued bytes. Tokens of clients already removed
    /// are ignored.
    pub fn handle_event(&mut self, token: Token, event_loop: &mut dyn EventLoop) {
        if self.closed {
            return;
        }
        if token == LISTENER_TOKEN {
            self.accept(event_loop);
            return;
        }

        let Some(client) = self.clients.get_mut(&token) else {
            debug!(
                target: TRANSPORT_TARGET,
                token = token.0,
                "event for departed client ignored"
            );
            return;
        };
        if let ConnectionState::Closed(reason) = client.handle_readable(&self.registry) {
            self.remove_client(token, event_loop, &reason);
        }
    }

    /// Accepts one pending connection and starts watching it.
    ///
    /// Returns the new client's token. Failures are logged and leave the
    /// server untouched.
    pub fn accept(&mut self, event_loop: &mut dyn EventLoop) -> Option<Token> {
        let stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return None,
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    error = %error,
                    "failed to accept client connection"
                );
                return None;
            }
        };
        if let Err(error) = stream.set_nonblocking(true) {
            warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                "failed to make client socket non-blocking"
            );
            return None;
        }

        let token = Token(self.next_token);
        self.next_token += 1;
        if let Err(error) = event_loop.watch(stream.as_raw_fd(), token) {
            warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                "failed to watch client connection"
            );
            return None;
        }

        debug!(
            target: TRANSPORT_TARGET,
            fd = stream.as_raw_fd(),
            token = token.0,
            "client connected"
        );
        self.clients
            .insert(token, ClientConnection::new(stream, self.max_message_len));
        Some(token)
    }

    /// Stops watching the client behind `token` and closes its socket.
    ///
    /// Returns `false` when no such client exists.
    pub fn client_disappeared(&mut self, token: Token, event_loop: &mut dyn EventLoop) -> bool {
        self.remove_client(token, event_loop, &DisconnectReason::EndOfStream)
    }

    fn remove_client(
        &mut self,
        token: Token,
        event_loop: &mut dyn EventLoop,
        reason: &DisconnectReason,
    ) -> bool {
        let Some(client) = self.clients.remove(&token) else {
            return false;
        };
        event_loop.unwatch(client.fd());
        match reason {
            DisconnectReason::EndOfStream => debug!(
                target: TRANSPORT_TARGET,
                token = token.0,
                "client disconnected"
            ),
            DisconnectReason::Protocol(_) => warn!(
                target: TRANSPORT_TARGET,
                token = token.0,
                reason = %reason,
                "dropping misbehaving client"
            ),
            _ => info!(
                target: TRANSPORT_TARGET,
                token = token.0,
                reason = %reason,
                "removing client after I/O failure"
            ),
        }
        true
    }

    /// Disconnects every client, stops watching the listener and unlinks
    /// the socket path. Calling it again has no effect.
    pub fn shutdown(&mut self, event_loop: &mut dyn EventLoop) {
        if self.closed {
            return;
        }
        for (_, client) in self.clients.drain() {
            event_loop.unwatch(client.fd());
        }
        event_loop.unwatch(self.listener.as_raw_fd());
        cleanup_socket_file(&self.path);
        self.closed = true;
        info!(
            target: TRANSPORT_TARGET,
            path = %self.path.display(),
            "control socket closed"
        );
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(
            target: TRANSPORT_TARGET,
            path = %self.path.display(),
            watched = self.clients.len() + 1,
            "server dropped without shutdown; descriptors remain watched"
        );
        cleanup_socket_file(&self.path);
    }
}

fn remove_stale_socket(path: &Path) -> Result<(), ServerError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(
                target: TRANSPORT_TARGET,
                path = %path.display(),
                "removed stale socket file"
            );
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ServerError::Cleanup {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn cleanup_socket_file(path: &Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path.display(),
            "failed to remove unix socket file"
        );
    }
}
