//! Command-line grammar for the `sockctl` client.

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use sockctl_config::{SOCKET_ENV, SocketPath, default_socket_path};

/// Default bound on connecting, sending and receiving.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Parser)]
#[command(
    name = "sockctl",
    version,
    about = "Send one request to a sockctld control socket"
)]
pub(crate) struct Cli {
    /// Path of the daemon's control socket.
    #[arg(
        long = "socket",
        global = true,
        env = SOCKET_ENV,
        value_name = "PATH",
        default_value_t = default_socket_path()
    )]
    pub(crate) socket: SocketPath,
    /// Seconds to wait for the connection and for each read or write.
    #[arg(
        long = "timeout",
        global = true,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) timeout: u64,
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    pub(crate) const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Invoke a method with optional JSON data.
    Call {
        /// Registered method name, for example `sockctl/echo`.
        method: String,
        /// JSON value passed as the request's `data`.
        #[arg(default_value = "{}", value_parser = parse_json)]
        data: Value,
    },
    /// Check that the daemon answers.
    Ping,
}

fn parse_json(input: &str) -> Result<Value, String> {
    serde_json::from_str(input).map_err(|error| format!("DATA is not valid JSON: {error}"))
}
