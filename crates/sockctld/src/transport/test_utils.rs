//! Shared fixtures for exercising the server over a real socket.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use sockctl_proto::{DEFAULT_MAX_MESSAGE_LEN, read_frame};

use super::{PollEventLoop, Server, Token};
use crate::dispatch::MethodRegistry;

const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Encodes `payload` behind a native-endian length prefix.
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).expect("payload length fits in u32");
    let mut bytes = len.to_ne_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// A bound server, its event loop and a scratch directory for the socket.
pub(crate) struct ServerHarness {
    pub(crate) server: Server,
    pub(crate) event_loop: PollEventLoop,
    pub(crate) path: PathBuf,
    _dir: TempDir,
}

impl ServerHarness {
    pub(crate) fn start() -> Self {
        Self::start_with(DEFAULT_MAX_MESSAGE_LEN)
    }

    pub(crate) fn start_with(max_message_len: usize) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sockctld.sock");
        let mut registry = MethodRegistry::new();
        registry.register_method("ping", |_| json!({ "pong": true }));
        registry.register_method("echo", |data| data);
        let mut event_loop = PollEventLoop::new();
        let server = Server::create(&path, registry, max_message_len, &mut event_loop)
            .expect("server starts");
        Self {
            server,
            event_loop,
            path,
            _dir: dir,
        }
    }

    /// Connects a blocking client and lets the server accept it.
    pub(crate) fn connect(&mut self) -> UnixStream {
        let stream = UnixStream::connect(&self.path).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let before = self.server.client_count();
        self.pump_until(|harness| harness.server.client_count() > before);
        stream
    }

    /// Handles one round of ready events. Returns the tokens processed.
    pub(crate) fn pump(&mut self) -> Vec<Token> {
        let ready = self.event_loop.poll(Some(POLL_TIMEOUT)).expect("poll");
        for token in &ready {
            self.server.handle_event(*token, &mut self.event_loop);
        }
        ready
    }

    /// Pumps until `done` holds, failing after a bounded number of rounds.
    pub(crate) fn pump_until(&mut self, done: impl Fn(&Self) -> bool) {
        for _ in 0..50 {
            if done(self) {
                return;
            }
            self.pump();
        }
        assert!(done(self), "condition not reached while pumping the server");
    }

    /// Sends `bytes` and processes the resulting readiness once.
    pub(crate) fn send(&mut self, client: &mut UnixStream, bytes: &[u8]) {
        client.write_all(bytes).expect("client write");
        self.pump();
    }

    /// Reads one response frame from `client`.
    pub(crate) fn response(client: &mut UnixStream) -> Value {
        read_frame(client, DEFAULT_MAX_MESSAGE_LEN).expect("response frame")
    }
}
