mod dispatch;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::Instrument;

use crate::Agent;
use crate::context::ContextVariables;
use crate::error::{Abort, Error};
use crate::model_client::RetryConfig;
use crate::trace::{Trace, TraceEvent, TraceEventKind, TraceSink, Tracer};

/// The default limit of chat-completion calls in one run.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// The result of a controller run.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// The agent that was active when the run finished.
    pub agent: Agent,
    /// The final reply, or `None` if the model produced no text.
    pub message: Option<String>,
    /// The number of chat-completion calls made.
    pub turns: usize,
}

/// [`Controller`] builder.
pub struct ControllerBuilder {
    max_turns: usize,
    context_variables: ContextVariables,
    retry: RetryConfig,
    on_trace: Option<TraceSink>,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            context_variables: ContextVariables::new(),
            retry: RetryConfig::default(),
            on_trace: None,
        }
    }
}

impl ControllerBuilder {
    /// Creates a builder with the default settings.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the number of chat-completion calls in one run.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Seeds the shared context.
    #[inline]
    pub fn with_context_variables<C: Into<ContextVariables>>(
        mut self,
        context_variables: C,
    ) -> Self {
        self.context_variables = context_variables.into();
        self
    }

    /// Sets how rate-limited model requests are retried.
    #[inline]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Attaches a callback receiving every trace event.
    #[inline]
    pub fn on_trace(
        mut self,
        on_trace: impl Fn(&TraceEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_trace = Some(Arc::new(on_trace));
        self
    }

    /// Attaches a shared trace sink, such as [`crate::trace::log_events`].
    #[inline]
    pub fn with_trace_sink(mut self, sink: TraceSink) -> Self {
        self.on_trace = Some(sink);
        self
    }

    /// Builds the controller.
    #[inline]
    pub fn build(self) -> Controller {
        Controller {
            max_turns: self.max_turns,
            context_variables: self.context_variables,
            retry: self.retry,
            tracer: Tracer::new(self.on_trace),
        }
    }
}

/// Drives agents through the tool-calling loop.
///
/// A run sends the active agent's history to the model, dispatches the
/// requested tool calls one by one in the order the model returned them,
/// and repeats until the model answers without requesting tools. Tools may
/// hand control to another agent; the switch is visible to the next call
/// in the same batch.
///
/// The controller owns the shared [`ContextVariables`] and the [`Trace`],
/// both of which persist across runs.
pub struct Controller {
    max_turns: usize,
    context_variables: ContextVariables,
    retry: RetryConfig,
    tracer: Tracer,
}

impl Default for Controller {
    fn default() -> Self {
        ControllerBuilder::default().build()
    }
}

impl Controller {
    /// Runs `agent`, optionally sending `message` first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] with [`Abort::MaxTurns`] when the model
    /// keeps requesting tools past the turn limit. Model failures, malformed
    /// tool arguments and tool failures are returned as well. Messages
    /// appended and context merged before the error stay committed.
    pub async fn run(
        &mut self,
        agent: &Agent,
        message: Option<&str>,
    ) -> Result<Response, Error> {
        let span = debug_span!("controller run", agent = agent.name());
        self.run_loop(agent.clone(), message).instrument(span).await
    }

    async fn run_loop(
        &mut self,
        mut active: Agent,
        message: Option<&str>,
    ) -> Result<Response, Error> {
        active.resolve_instruction(&self.context_variables);
        if let Some(message) = message {
            self.tracer.emit(
                &active,
                TraceEventKind::UserMessage {
                    content: message.to_owned(),
                },
            );
        }

        let mut turns = 1;
        let mut completion =
            active.chat_with_retry(message, &self.retry).await?;
        loop {
            if let Some(content) = &completion.content {
                self.tracer.emit(
                    &active,
                    TraceEventKind::AgentMessage {
                        content: content.clone(),
                    },
                );
            }
            if completion.tool_calls.is_empty() {
                break;
            }

            for call in &completion.tool_calls {
                if let Some(next) = self.dispatch(&active, call).await? {
                    active = next;
                }
            }

            turns += 1;
            if turns > self.max_turns {
                warn!(
                    "agent {} exceeded {} turns",
                    active.name(),
                    self.max_turns
                );
                return Err(Abort::MaxTurns(self.max_turns).into());
            }
            completion = active.chat_with_retry(None, &self.retry).await?;
        }

        self.tracer.trace_mut().finish();
        debug!("run finished after {turns} turns on {}", active.name());
        Ok(Response {
            agent: active,
            message: completion.content,
            turns,
        })
    }

    /// Returns the turn limit.
    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Returns the shared context.
    #[inline]
    pub fn context_variables(&self) -> &ContextVariables {
        &self.context_variables
    }

    /// Merges entries into the shared context.
    #[inline]
    pub fn update_context_variables<C: Into<ContextVariables>>(
        &mut self,
        delta: C,
    ) {
        self.context_variables.update(delta);
    }

    /// Returns the trace of every run so far.
    #[inline]
    pub fn trace(&self) -> &Trace {
        self.tracer.trace()
    }

    /// Starts a new, empty trace.
    #[inline]
    pub fn reset_trace(&mut self) {
        self.tracer.reset();
    }
}
