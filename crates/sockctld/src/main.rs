use std::io::{self, Write};
use std::process::ExitCode;

use sockctld::{BootstrapError, LaunchError};

fn main() -> ExitCode {
    match sockctld::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Bootstrap {
            source: BootstrapError::Configuration { source },
        }) => source.exit(),
        Err(error) => {
            drop(writeln!(io::stderr().lock(), "sockctld: {error}"));
            ExitCode::FAILURE
        }
    }
}
