use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

use baton_model::ModelProviderError;

use crate::remote::RemoteError;
use crate::tool::Error as ToolError;

/// A fatal stop raised by a turn or time limit.
///
/// Unlike a graceful stop (a terminator that simply matches), an abort
/// unwinds the run immediately. Messages already appended and context
/// already merged stay committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Abort {
    /// The accumulated number of turns reached the limit.
    MaxTurns(usize),
    /// The number of agent activations reached the limit.
    MaxActive(usize),
    /// The run took longer than the limit.
    Timeout(Duration),
}

impl Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::MaxTurns(limit) => {
                write!(f, "maximum number of turns ({limit}) exceeded")
            }
            Abort::MaxActive(limit) => {
                write!(f, "maximum number of activations ({limit}) exceeded")
            }
            Abort::Timeout(limit) => {
                write!(f, "run timed out after {limit:?}")
            }
        }
    }
}

impl StdError for Abort {}

/// The error type for running agents, controllers and teams.
#[derive(Debug)]
pub enum Error {
    /// The chat-completion backend failed.
    Model(Box<dyn ModelProviderError>),
    /// The model produced tool arguments that are not a JSON object.
    InvalidArguments {
        /// The requested tool.
        tool: String,
        /// The decoding error.
        source: serde_json::Error,
    },
    /// A local tool failed.
    Tool {
        /// The failing tool.
        tool: String,
        /// The error reported by the tool.
        source: ToolError,
    },
    /// A remote (MCP) tool failed.
    Remote {
        /// The failing tool.
        tool: String,
        /// The error reported by the provider.
        source: RemoteError,
    },
    /// A turn or time limit was hit.
    Aborted(Abort),
    /// A team was configured in a way it cannot run.
    InvalidTeam(String),
}

impl Error {
    /// Returns the abort reason if this error is a fatal stop.
    #[inline]
    pub fn as_abort(&self) -> Option<Abort> {
        match self {
            Error::Aborted(abort) => Some(*abort),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Model(err) => write!(f, "model request failed: {err}"),
            Error::InvalidArguments { tool, source } => {
                write!(f, "invalid arguments for tool `{tool}`: {source}")
            }
            Error::Tool { tool, source } => {
                write!(f, "tool `{tool}` failed: {}", source.reason())
            }
            Error::Remote { tool, source } => {
                write!(f, "remote tool `{tool}` failed: {source}")
            }
            Error::Aborted(abort) => write!(f, "run aborted: {abort}"),
            Error::InvalidTeam(reason) => write!(f, "invalid team: {reason}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Model(err) => Some(err.as_ref()),
            Error::InvalidArguments { source, .. } => Some(source),
            Error::Tool { source, .. } => Some(source),
            Error::Remote { source, .. } => Some(source),
            Error::Aborted(abort) => Some(abort),
            Error::InvalidTeam(_) => None,
        }
    }
}

impl From<Abort> for Error {
    #[inline]
    fn from(abort: Abort) -> Self {
        Error::Aborted(abort)
    }
}
