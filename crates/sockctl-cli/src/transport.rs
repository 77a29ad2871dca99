//! Blocking client for the daemon's control socket.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use socket2::{Domain, SockAddr, Socket, Type};

use sockctl_proto::{Request, read_frame, write_frame};

use crate::errors::AppError;

/// Largest response the client is prepared to buffer.
pub const MAX_RESPONSE_LEN: usize = 64 << 20;

/// One connection to the daemon, used for any number of calls.
#[derive(Debug)]
pub struct Client {
    stream: UnixStream,
    endpoint: String,
}

impl Client {
    /// Connects to the socket at `path`, bounding the connect and every
    /// subsequent read and write by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connect`] when the socket is missing, refuses
    /// the connection or the timeout elapses.
    pub fn connect(path: &Path, timeout: Duration) -> Result<Self, AppError> {
        let endpoint = path.display().to_string();
        let stream = connect_unix(path, timeout).map_err(|source| AppError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        Ok(Self { stream, endpoint })
    }

    /// Sends `{"method": method, "data": data}` and waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SendRequest`] or [`AppError::ReadResponse`] when
    /// the exchange fails, including when the daemon closes the connection
    /// instead of answering.
    pub fn call(&mut self, method: &str, data: Value) -> Result<Value, AppError> {
        let request = Request::new(method, data);
        write_frame(&mut self.stream, &request).map_err(|source| AppError::SendRequest {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        read_frame(&mut self.stream, MAX_RESPONSE_LEN).map_err(|source| AppError::ReadResponse {
            endpoint: self.endpoint.clone(),
            source,
        })
    }
}

fn connect_unix(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    let stream: UnixStream = socket.into();
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}
