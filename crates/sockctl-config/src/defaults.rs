use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketPath;

/// Directory created under the runtime base to hold the socket.
pub const SOCKET_DIRECTORY: &str = "sockctl";

/// File name of the daemon socket.
pub const SOCKET_FILE_NAME: &str = "sockctld.sock";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default ceiling for a whole frame, header included (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1 << 20;

/// Smallest frame ceiling accepted by the configuration.
pub const MIN_MAX_MESSAGE_BYTES: usize = 64;

/// Owned log filter value used where allocation is required (e.g. clap).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default socket path for the daemon.
///
/// The socket lives in the per-user runtime directory when one exists.
/// Otherwise it falls back to the temporary directory, namespaced by the
/// effective user id so that users on the same host do not collide.
pub fn default_socket_path() -> SocketPath {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push(SOCKET_DIRECTORY);
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketPath::new(base.join(SOCKET_FILE_NAME))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    String::from("uid-unknown")
}
