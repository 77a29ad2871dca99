//! Methods every daemon answers out of the box.

use serde_json::{Value, json};

use crate::dispatch::MethodRegistry;

/// Liveness probe; answers `{"pong": true}`.
pub const PING_METHOD: &str = "sockctl/ping";
/// Returns the request's `data` unchanged.
pub const ECHO_METHOD: &str = "sockctl/echo";
/// Reports the daemon's package version.
pub const VERSION_METHOD: &str = "sockctl/version";

/// Adds the built-in methods to `registry`.
pub fn register_builtin_methods(registry: &mut MethodRegistry) {
    registry.register_method(PING_METHOD, |_| json!({ "pong": true }));
    registry.register_method(ECHO_METHOD, |data: Value| data);
    registry.register_method(VERSION_METHOD, |_| {
        json!({ "version": env!("CARGO_PKG_VERSION") })
    });
}
