use std::error::Error as StdError;
use std::fmt::{self, Display};

use baton_core::remote::RemoteError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection could not be established or broke.
    Transport,
    /// The server sent something that is not valid MCP.
    Protocol,
    /// The server answered with a JSON-RPC error.
    Server,
    /// The server did not answer in time.
    Timeout,
    /// The connection has been closed.
    Closed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::Protocol => write!(f, "Protocol error"),
            ErrorKind::Server => write!(f, "Server error"),
            ErrorKind::Timeout => write!(f, "Timed out"),
            ErrorKind::Closed => write!(f, "Connection closed"),
        }
    }
}

/// Error type for MCP connections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl From<Error> for RemoteError {
    #[inline]
    fn from(err: Error) -> Self {
        RemoteError::new(err.to_string())
    }
}
