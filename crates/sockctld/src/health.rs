//! Structured health reporting for daemon lifecycle events.

use std::path::Path;
use std::sync::Arc;

use sockctl_config::Config;

use crate::bootstrap::BootstrapError;
use crate::transport::ServerError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the control socket accepts connections.
    fn server_listening(&self, path: &Path);

    /// Invoked when the control socket could not be created. The daemon
    /// keeps running without it.
    fn server_unavailable(&self, error: &ServerError);

    /// Invoked after the control socket has been closed and unlinked.
    fn server_stopped(&self, path: &Path);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn server_listening(&self, path: &Path) {
        (**self).server_listening(path);
    }

    fn server_unavailable(&self, error: &ServerError) {
        (**self).server_unavailable(error);
    }

    fn server_stopped(&self, path: &Path) {
        (**self).server_stopped(path);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            max_message_bytes = config.max_message_bytes(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn server_listening(&self, path: &Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_listening",
            socket = %path.display(),
            "control socket ready"
        );
    }

    fn server_unavailable(&self, error: &ServerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "server_unavailable",
            error = %error,
            "control socket unavailable; continuing without it"
        );
    }

    fn server_stopped(&self, path: &Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            socket = %path.display(),
            "control socket stopped"
        );
    }
}
