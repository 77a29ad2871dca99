//! Error types for the CLI runtime.

use std::io;

use thiserror::Error;

use sockctl_proto::FrameError;

/// Failures surfaced to the user by `sockctl`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send request to daemon at {endpoint}: {source}")]
    SendRequest {
        endpoint: String,
        #[source]
        source: FrameError,
    },
    #[error("failed to read response from daemon at {endpoint}: {source}")]
    ReadResponse {
        endpoint: String,
        #[source]
        source: FrameError,
    },
    #[error("failed to render response: {0}")]
    Render(#[source] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    #[error("daemon reported an error: {0}")]
    Daemon(String),
}
