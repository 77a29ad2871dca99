//! Daemon run loop and shutdown handling.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::builtin::register_builtin_methods;
use crate::dispatch::MethodRegistry;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{PollEventLoop, Server};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Upper bound on how long the loop sleeps before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors surfaced while launching or running the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting for readiness failed.
    #[error("event loop failed: {source}")]
    EventLoop {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal {
    /// Returns `true` once the daemon should stop.
    fn requested(&self) -> bool;
}

/// Shutdown flag raised by `SIGTERM`, `SIGINT`, `SIGQUIT` or `SIGHUP`.
#[derive(Debug, Clone)]
pub struct SystemShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl SystemShutdownSignal {
    /// Registers the termination signals against a fresh flag.
    ///
    /// # Errors
    ///
    /// Propagates failures from installing the signal handlers.
    pub fn install() -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        for signal in [SIGTERM, SIGINT, SIGQUIT, SIGHUP] {
            signal_hook::flag::register(signal, Arc::clone(&flag))?;
        }
        Ok(Self { flag })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for AtomicBool {
    fn requested(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap fails, signal handlers cannot be
/// installed or the event loop fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let shutdown =
        SystemShutdownSignal::install().map_err(|source| LaunchError::Signals { source })?;
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &shutdown,
    )
}

/// Runs the daemon with injected collaborators until `shutdown` fires.
///
/// # Errors
///
/// See [`run_daemon`].
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    info!(
        target: PROCESS_TARGET,
        pid = std::process::id(),
        "starting daemon runtime"
    );

    let mut event_loop = PollEventLoop::new();
    let mut registry = MethodRegistry::new();
    register_builtin_methods(&mut registry);
    let mut server = daemon.start_server(registry, &mut event_loop);

    let outcome = serve(&mut event_loop, server.as_mut(), shutdown);

    if let Some(server) = server.as_mut() {
        server.shutdown(&mut event_loop);
        daemon.reporter().server_stopped(server.socket_path());
    }
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    outcome
}

fn serve(
    event_loop: &mut PollEventLoop,
    mut server: Option<&mut Server>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    while !shutdown.requested() {
        let ready = event_loop
            .poll(Some(POLL_INTERVAL))
            .map_err(|source| LaunchError::EventLoop { source })?;
        if let Some(server) = server.as_deref_mut() {
            for token in ready {
                server.handle_event(token, event_loop);
            }
        }
    }
    info!(target: PROCESS_TARGET, "shutdown requested");
    Ok(())
}
