//! Command-line client for the `sockctld` control socket.
//!
//! `sockctl` opens one connection, sends a single framed request and prints
//! the daemon's reply as pretty JSON. A reply carrying an `error` member is
//! printed as well, but the process exits with a failure status so scripts
//! can branch on it.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use serde_json::Value;

mod cli;
mod errors;
mod transport;

use cli::{Cli, Command};
pub use errors::AppError;
pub use transport::{Client, MAX_RESPONSE_LEN};

/// Method invoked by `sockctl ping`.
const PING_METHOD: &str = "sockctl/ping";

/// Exit status for usage errors, matching clap's convention.
const USAGE_EXIT: u8 = 2;

/// Parses `args`, performs the request and reports the outcome.
///
/// Help and version output go to `stdout` with a success status. Every
/// other failure is written to `stderr` prefixed with `sockctl:`.
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };

    match execute(&cli, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "sockctl: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write>(cli: &Cli, stdout: &mut W) -> Result<(), AppError> {
    let (method, data) = match &cli.command {
        Command::Call { method, data } => (method.as_str(), data.clone()),
        Command::Ping => (PING_METHOD, Value::Object(serde_json::Map::new())),
    };

    let mut client = Client::connect(cli.socket.as_std_path(), cli.timeout())?;
    let response = client.call(method, data)?;

    let rendered = serde_json::to_string_pretty(&response).map_err(AppError::Render)?;
    writeln!(stdout, "{rendered}").map_err(AppError::Output)?;

    match response.get("error") {
        Some(Value::String(message)) => Err(AppError::Daemon(message.clone())),
        Some(other) => Err(AppError::Daemon(other.to_string())),
        None => Ok(()),
    }
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    let rendered = error.render().to_string();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => match write!(stdout, "{rendered}") {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        },
        _ => {
            drop(write!(stderr, "{rendered}"));
            ExitCode::from(USAGE_EXIT)
        }
    }
}
