//! CLI entrypoint for the `sockctl` control socket client.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    sockctl_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
