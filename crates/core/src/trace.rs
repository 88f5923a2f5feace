//! Observable record of a run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Agent;
use crate::context::ContextVariables;

/// A callback receiving every trace event as it happens.
///
/// Sinks are invoked synchronously, in dispatch order. A panicking sink is
/// logged and otherwise ignored.
pub type TraceSink = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Identifies the agent an event belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentInfo {
    /// The agent's id.
    pub id: u64,
    /// The agent's name.
    pub name: String,
}

impl From<&Agent> for AgentInfo {
    #[inline]
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id(),
            name: agent.name().to_owned(),
        }
    }
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// The caller sent a message to the agent.
    UserMessage {
        /// The message.
        content: String,
    },
    /// The model replied with text.
    AgentMessage {
        /// The reply.
        content: String,
    },
    /// A tool call is about to be dispatched.
    ToolCall {
        /// The call id assigned by the model.
        id: String,
        /// The tool name.
        name: String,
        /// The arguments, without injected values.
        arguments: Value,
    },
    /// A tool call has completed.
    ToolResult {
        /// The call id assigned by the model.
        id: String,
        /// The tool name.
        name: String,
        /// The outcome, omitting an empty context delta and a default
        /// history flag.
        result: Value,
    },
    /// A tool call is forwarded to a remote provider.
    McpToolCall {
        /// The provider's name.
        server: String,
        /// The tool name.
        name: String,
        /// The arguments.
        arguments: Value,
    },
    /// Control moved to another agent.
    AgentSwitch {
        /// The agent that became active.
        to: AgentInfo,
        /// Whether the history was copied.
        copy_history: bool,
    },
    /// A tool changed the shared context.
    ContextUpdate {
        /// The context before the merge.
        previous: ContextVariables,
        /// The entries merged in.
        delta: ContextVariables,
    },
}

/// A timestamped, attributed trace event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// The agent that was active.
    pub agent: AgentInfo,
    /// What happened.
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agent = &self.agent.name;
        match &self.kind {
            TraceEventKind::UserMessage { content } => {
                write!(f, "[{agent}] user: {content}")
            }
            TraceEventKind::AgentMessage { content } => {
                write!(f, "[{agent}] assistant: {content}")
            }
            TraceEventKind::ToolCall {
                name, arguments, ..
            } => write!(f, "[{agent}] call {name}({arguments})"),
            TraceEventKind::ToolResult { name, result, .. } => {
                write!(f, "[{agent}] {name} -> {result}")
            }
            TraceEventKind::McpToolCall { server, name, .. } => {
                write!(f, "[{agent}] forward {name} to {server}")
            }
            TraceEventKind::AgentSwitch { to, .. } => {
                write!(f, "[{agent}] switch to {}", to.name)
            }
            TraceEventKind::ContextUpdate { delta, .. } => {
                write!(f, "[{agent}] context update {}", delta.to_value())
            }
        }
    }
}

/// An append-only log of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// A unique id.
    pub id: String,
    /// The events, in the order they happened.
    pub events: Vec<TraceEvent>,
    /// When the trace was started.
    pub start_time: DateTime<Utc>,
    /// When the latest run completed.
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    /// Starts an empty trace.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events: vec![],
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Iterates the events of a kind, selected by `filter`.
    pub fn events_matching<'a, F>(
        &'a self,
        filter: F,
    ) -> impl Iterator<Item = &'a TraceEvent>
    where
        F: Fn(&TraceEventKind) -> bool + 'a,
    {
        self.events.iter().filter(move |event| filter(&event.kind))
    }

    pub(crate) fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }
}

/// Records events into a [`Trace`] and forwards them to a sink.
pub(crate) struct Tracer {
    trace: Trace,
    sink: Option<TraceSink>,
}

impl Tracer {
    pub(crate) fn new(sink: Option<TraceSink>) -> Self {
        Self {
            trace: Trace::new(),
            sink,
        }
    }

    pub(crate) fn emit(&mut self, agent: &Agent, kind: TraceEventKind) {
        let event = TraceEvent {
            timestamp: Utc::now(),
            agent: agent.into(),
            kind,
        };
        trace!("trace event: {event}");
        if let Some(sink) = &self.sink {
            if catch_unwind(AssertUnwindSafe(|| sink(&event))).is_err() {
                warn!("trace sink panicked on {event}");
            }
        }
        self.trace.events.push(event);
    }

    #[inline]
    pub(crate) fn trace(&self) -> &Trace {
        &self.trace
    }

    #[inline]
    pub(crate) fn trace_mut(&mut self) -> &mut Trace {
        &mut self.trace
    }

    pub(crate) fn reset(&mut self) {
        self.trace = Trace::new();
    }
}

/// Returns a sink that logs every event through `tracing` at the info
/// level.
pub fn log_events() -> TraceSink {
    Arc::new(|event: &TraceEvent| {
        info!(target: "baton::trace", "{event}");
    })
}
