//! Test harness utilities for the daemon behavioural suites.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tempfile::TempDir;

use sockctl_config::{Config, ConfigError, SocketPath};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::transport::ServerError;

/// Loader that provisions a socket path under a temporary directory.
pub struct TestConfigLoader {
    dir: TempDir,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary directory for socket"),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("run").join("sockctld.sock")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let path = Utf8PathBuf::from_path_buf(self.socket_path())
            .expect("temporary socket path was not valid UTF-8");
        Ok(Config {
            socket: SocketPath::new(path),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid frame ceiling.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from_iter(["sockctld", "--max-message-bytes", "1"])
    }
}

/// Loader whose socket path points below a regular file, so the socket
/// directory can never be created.
pub struct UnpreparableSocketLoader {
    dir: TempDir,
}

impl UnpreparableSocketLoader {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temporary directory");
        std::fs::write(dir.path().join("blocker"), b"").expect("blocking file");
        Self { dir }
    }
}

impl ConfigLoader for UnpreparableSocketLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let path = self.dir.path().join("blocker").join("sockctld.sock");
        Ok(Config {
            socket: SocketPath::new(Utf8PathBuf::from_path_buf(path).expect("utf-8 path")),
            ..Config::default()
        })
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn server_listening(&self, path: &Path) {
        self.record(HealthEvent::ServerListening(path.to_path_buf()));
    }

    fn server_unavailable(&self, error: &ServerError) {
        self.record(HealthEvent::ServerUnavailable(error.to_string()));
    }

    fn server_stopped(&self, path: &Path) {
        self.record(HealthEvent::ServerStopped(path.to_path_buf()));
    }
}

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServerListening(PathBuf),
    ServerUnavailable(String),
    ServerStopped(PathBuf),
}

/// Shared reporter handle used across a scenario.
pub fn recording_reporter() -> Arc<RecordingHealthReporter> {
    Arc::new(RecordingHealthReporter::default())
}
