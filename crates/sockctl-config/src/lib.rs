//! Shared configuration for the `sockctl` daemon and client.
//!
//! Both binaries agree on where the control socket lives, how large a frame
//! may be and how logs are rendered. Every option can be given as a command
//! line flag or through a `SOCKCTL_*` environment variable; flags win over
//! the environment, which wins over the built-in defaults.

use std::ffi::OsString;

use clap::{Args, Parser};
use thiserror::Error;

mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_MESSAGE_BYTES, MIN_MAX_MESSAGE_BYTES, SOCKET_DIRECTORY,
    SOCKET_FILE_NAME, default_log_filter_string, default_log_format, default_socket_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketParseError, SocketPath, SocketPreparationError};

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "SOCKCTL_SOCKET";
/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "SOCKCTL_LOG_FILTER";
/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "SOCKCTL_LOG_FORMAT";
/// Environment variable overriding the frame ceiling.
pub const MAX_MESSAGE_BYTES_ENV: &str = "SOCKCTL_MAX_MESSAGE_BYTES";

/// Resolved configuration shared by the daemon and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct Config {
    /// Path of the daemon's control socket.
    #[arg(
        long = "socket",
        env = SOCKET_ENV,
        value_name = "PATH",
        default_value_t = default_socket_path()
    )]
    pub socket: SocketPath,
    /// Tracing filter directive (for example `info` or `sockctld=debug`).
    #[arg(
        long = "log-filter",
        env = LOG_FILTER_ENV,
        value_name = "FILTER",
        default_value_t = default_log_filter_string()
    )]
    pub log_filter: String,
    /// Log output format: `json` or `compact`.
    #[arg(
        long = "log-format",
        env = LOG_FORMAT_ENV,
        value_name = "FORMAT",
        default_value_t = default_log_format()
    )]
    pub log_format: LogFormat,
    /// Largest accepted frame in bytes, including the four byte header.
    #[arg(
        long = "max-message-bytes",
        env = MAX_MESSAGE_BYTES_ENV,
        value_name = "BYTES",
        default_value_t = DEFAULT_MAX_MESSAGE_BYTES,
        value_parser = parse_max_message_bytes
    )]
    pub max_message_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: default_socket_path(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cli`] when an option is malformed or when help
    /// or version output was requested.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cli`] when an option is malformed.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = ConfigCli::try_parse_from(args)?;
        Ok(cli.config)
    }

    /// Path of the daemon's control socket.
    #[must_use]
    pub const fn socket(&self) -> &SocketPath {
        &self.socket
    }

    /// Tracing filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Largest accepted frame in bytes, header included.
    #[must_use]
    pub const fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }
}

#[derive(Debug, Parser)]
#[command(name = "sockctld", version)]
struct ConfigCli {
    #[command(flatten)]
    config: Config,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Argument or environment parsing failed, or help was requested.
    #[error(transparent)]
    Cli(#[from] clap::Error),
}

impl ConfigError {
    /// Prints the error (or requested help text) and exits the process with
    /// the conventional status code.
    pub fn exit(&self) -> ! {
        match self {
            Self::Cli(error) => error.exit(),
        }
    }
}

fn parse_max_message_bytes(input: &str) -> Result<usize, String> {
    let value: usize = input
        .trim()
        .parse()
        .map_err(|error| format!("'{input}' is not a byte count: {error}"))?;
    if value < MIN_MAX_MESSAGE_BYTES {
        return Err(format!(
            "frame ceiling must be at least {MIN_MAX_MESSAGE_BYTES} bytes, got {value}"
        ));
    }
    if u32::try_from(value).is_err() {
        return Err(format!("frame ceiling {value} exceeds the 32-bit length prefix"));
    }
    Ok(value)
}
