//! Local control channel daemon.
//!
//! `sockctld` listens on a Unix domain socket and answers length-prefixed
//! JSON requests by dispatching them to named handlers. Everything runs on
//! one thread: a `poll(2)` reactor reports readable descriptors and the
//! [`Server`] reacts to each one without ever blocking on a read.
//!
//! Clients may deliver a frame in arbitrarily small pieces. Each connection
//! keeps its partial frame between events, enforces the configured frame
//! ceiling as soon as the length prefix is known and is dropped on any
//! protocol violation without disturbing other clients.
//!
//! Lifecycle events (bootstrap, socket readiness, shutdown) are reported
//! through a [`HealthReporter`] and logged with `tracing`.

mod bootstrap;
mod builtin;
mod dispatch;
mod health;
mod process;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use builtin::{ECHO_METHOD, PING_METHOD, VERSION_METHOD, register_builtin_methods};
pub use dispatch::{MethodHandler, MethodRegistry};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownSignal, SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ClientConnection, ConnectionState, DisconnectReason, EventLoop, LISTENER_TOKEN,
    PollEventLoop, ProtocolError, Server, ServerError, Token,
};

#[cfg(test)]
mod tests;
