use std::fmt;
use std::fs::DirBuilder;
use std::path::Path;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Filesystem location of the daemon's Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPath(Utf8PathBuf);

impl SocketPath {
    /// Wraps a socket path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a UTF-8 path.
    #[must_use]
    pub fn as_utf8(&self) -> &Utf8Path {
        &self.0
    }

    /// Returns the path as a standard library path.
    #[must_use]
    pub fn as_std_path(&self) -> &Path {
        self.0.as_std_path()
    }

    /// Ensures the socket's parent directory exists with restrictive permissions.
    ///
    /// # Errors
    ///
    /// Fails when the path has no parent or the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(parent) = self.0.parent() else {
            return Err(SocketPreparationError::MissingParent {
                path: self.0.clone(),
            });
        };
        if parent.as_str().is_empty() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        match builder.create(parent.as_std_path()) {
            Ok(()) => Ok(()),
            // A non-directory entry in the way also reports `AlreadyExists`.
            Err(source)
                if source.kind() == std::io::ErrorKind::AlreadyExists
                    && parent.as_std_path().is_dir() =>
            {
                Ok(())
            }
            Err(source) => Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}

impl fmt::Display for SocketPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for SocketPath {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SocketParseError::Empty);
        }
        if trimmed.ends_with('/') {
            return Err(SocketParseError::Directory(trimmed.to_owned()));
        }
        Ok(Self::new(trimmed))
    }
}

/// Errors encountered while parsing a [`SocketPath`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// No path was supplied.
    #[error("socket path must not be empty")]
    Empty,
    /// The path names a directory rather than a socket file.
    #[error("socket path '{0}' names a directory")]
    Directory(String),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Parent directory is missing when creating a Unix socket path.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Offending socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
