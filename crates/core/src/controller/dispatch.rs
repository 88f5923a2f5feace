use baton_model::ToolCallRequest;
use serde_json::{Map, Value};
use tracing::Instrument;

use super::Controller;
use crate::Agent;
use crate::agent::ToolBinding;
use crate::error::Error;
use crate::remote::join_content;
use crate::tool::{Injected, Outcome};
use crate::trace::TraceEventKind;

impl Controller {
    /// Applies one tool call to the active agent.
    ///
    /// Returns the agent that should become active, if the tool handed
    /// control to a different one.
    pub(super) async fn dispatch(
        &mut self,
        active: &Agent,
        call: &ToolCallRequest,
    ) -> Result<Option<Agent>, Error> {
        let arguments = parse_arguments(call)?;

        let Some(binding) = active.resolve_tool(&call.name) else {
            warn!("agent {} has no tool named {}", active.name(), call.name);
            active.add_tool_message(
                format!("Failed to call tool: {}", call.name),
                &call.id,
            );
            return Ok(None);
        };

        self.tracer.emit(
            active,
            TraceEventKind::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: Value::Object(arguments.clone()),
            },
        );
        let outcome = match binding {
            ToolBinding::Local(tool) => {
                let injection = tool.injection();
                let injected = Injected {
                    context_variables: injection
                        .context_variables
                        .is_some()
                        .then(|| self.context_variables.clone()),
                    agent: injection.agent.is_some().then(|| active.clone()),
                };
                let output =
                    tool.execute(arguments, injected).await.map_err(|source| {
                        Error::Tool {
                            tool: call.name.clone(),
                            source,
                        }
                    })?;
                Outcome::from(output)
            }
            ToolBinding::Remote(provider) => {
                self.tracer.emit(
                    active,
                    TraceEventKind::McpToolCall {
                        server: provider.name().to_owned(),
                        name: call.name.clone(),
                        arguments: Value::Object(arguments.clone()),
                    },
                );
                let span = debug_span!("remote tool call", tool = %call.name);
                let parts = provider
                    .call_tool(&call.name, arguments)
                    .instrument(span)
                    .await
                    .map_err(|source| Error::Remote {
                        tool: call.name.clone(),
                        source,
                    })?;
                Outcome::new().with_content(join_content(&parts))
            }
        };
        self.tracer.emit(
            active,
            TraceEventKind::ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                result: outcome.to_trace_value(),
            },
        );

        let Outcome {
            agent: target,
            content,
            context_variables: delta,
            copy_history,
        } = outcome;
        active.add_tool_message(content, &call.id);

        let mut current = active;
        let switched = target.filter(|target| target != active);
        if let Some(target) = &switched {
            if copy_history {
                target.set_messages(active.messages());
            }
            self.tracer.emit(
                active,
                TraceEventKind::AgentSwitch {
                    to: target.into(),
                    copy_history,
                },
            );
            debug!("switched from {} to {}", active.name(), target.name());
            current = target;
        }

        let context_changed = !delta.is_empty();
        if context_changed {
            let previous = self.context_variables.clone();
            self.context_variables.update(delta.clone());
            self.tracer.emit(
                current,
                TraceEventKind::ContextUpdate { previous, delta },
            );
        }
        if switched.is_some() || context_changed {
            current.resolve_instruction(&self.context_variables);
        }

        Ok(switched)
    }
}

/// Decodes the JSON arguments of a call. An empty string means no
/// arguments.
fn parse_arguments(
    call: &ToolCallRequest,
) -> Result<Map<String, Value>, Error> {
    if call.arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(&call.arguments).map_err(|source| {
        Error::InvalidArguments {
            tool: call.name.clone(),
            source,
        }
    })
}
