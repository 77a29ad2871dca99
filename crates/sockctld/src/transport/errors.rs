//! Error types for the control socket server and its clients.

use std::io;

use thiserror::Error;

use sockctl_proto::{FrameError, RequestError};

/// Errors surfaced while creating the control socket server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("frame ceiling of {max_message_len} bytes leaves no room for a payload")]
    InvalidFrameCeiling { max_message_len: usize },
    #[error("failed to remove stale socket file {path}: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind unix listener at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("failed to register listener with the event loop: {source}")]
    Watch {
        #[source]
        source: io::Error,
    },
}

/// Violations of the framing or request conventions by a client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("declared payload of {declared} bytes exceeds the {limit} byte limit")]
    Oversized { declared: usize, limit: usize },
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),
}

/// Why a client connection was closed.
#[derive(Debug, Error)]
pub enum DisconnectReason {
    #[error("peer closed the connection")]
    EndOfStream,
    #[error("failed to read from client: {0}")]
    Read(#[source] io::Error),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("failed to encode response: {0}")]
    Encode(#[source] FrameError),
    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),
}
