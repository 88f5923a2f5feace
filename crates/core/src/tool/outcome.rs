use serde_json::{Map, Value, json};

use crate::Agent;
use crate::context::ContextVariables;

/// The content reported to the model when a tool returns nothing else.
pub const DEFAULT_CONTENT: &str = "Function call successfully.";

/// The normalized outcome of one tool invocation.
///
/// It carries the text fed back to the model, an optional agent to hand
/// control to, a context delta to merge, and whether the conversation
/// history is copied to the new agent on handoff.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// The agent to hand control to.
    pub agent: Option<Agent>,
    /// The text fed back to the model as the tool message.
    pub content: String,
    /// Entries merged into the shared context after the call.
    pub context_variables: ContextVariables,
    /// Whether the new agent receives a copy of the caller's history.
    pub copy_history: bool,
}

impl Default for Outcome {
    fn default() -> Self {
        Self {
            agent: None,
            content: DEFAULT_CONTENT.to_owned(),
            context_variables: ContextVariables::new(),
            copy_history: true,
        }
    }
}

impl Outcome {
    /// Creates an outcome with the default content.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content.
    #[inline]
    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Hands control to `agent`.
    #[inline]
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Sets the context delta.
    #[inline]
    pub fn with_context_variables<C: Into<ContextVariables>>(
        mut self,
        context_variables: C,
    ) -> Self {
        self.context_variables = context_variables.into();
        self
    }

    /// Sets whether the history is copied on handoff.
    #[inline]
    pub fn with_copy_history(mut self, copy_history: bool) -> Self {
        self.copy_history = copy_history;
        self
    }

    /// Renders the outcome for a trace event, leaving out the context delta
    /// when it is empty and the history flag when it has the default value.
    pub(crate) fn to_trace_value(&self) -> Value {
        let mut value = Map::new();
        value.insert("content".to_owned(), json!(self.content));
        if let Some(agent) = &self.agent {
            value.insert("agent".to_owned(), json!(agent.name()));
        }
        if !self.context_variables.is_empty() {
            value.insert(
                "context_variables".to_owned(),
                self.context_variables.to_value(),
            );
        }
        if !self.copy_history {
            value.insert("copy_history".to_owned(), json!(false));
        }
        Value::Object(value)
    }
}

/// Everything a tool may return.
///
/// Each variant fills one part of an [`Outcome`]; the controller
/// normalizes the value with [`Outcome::from`] before applying it.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    /// Text fed back to the model.
    Text(String),
    /// A context delta, reported with the default content.
    ContextVariables(ContextVariables),
    /// A handoff to another agent, with the history copied.
    Agent(Agent),
    /// A complete outcome, passed through unchanged.
    Outcome(Outcome),
    /// Generic success.
    Done,
}

impl From<ToolOutput> for Outcome {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(content) => Outcome::new().with_content(content),
            ToolOutput::ContextVariables(context_variables) => {
                Outcome::new().with_context_variables(context_variables)
            }
            ToolOutput::Agent(agent) => {
                let content = json!({ "assistant": agent.name() }).to_string();
                Outcome::new().with_content(content).with_agent(agent)
            }
            ToolOutput::Outcome(outcome) => outcome,
            ToolOutput::Done => Outcome::new(),
        }
    }
}

impl From<String> for ToolOutput {
    #[inline]
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    #[inline]
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_owned())
    }
}

impl From<ContextVariables> for ToolOutput {
    #[inline]
    fn from(context_variables: ContextVariables) -> Self {
        ToolOutput::ContextVariables(context_variables)
    }
}

impl From<Agent> for ToolOutput {
    #[inline]
    fn from(agent: Agent) -> Self {
        ToolOutput::Agent(agent)
    }
}

impl From<Outcome> for ToolOutput {
    #[inline]
    fn from(outcome: Outcome) -> Self {
        ToolOutput::Outcome(outcome)
    }
}

impl From<()> for ToolOutput {
    #[inline]
    fn from(_: ()) -> Self {
        ToolOutput::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outcome() {
        let outcome = Outcome::new();
        assert_eq!(outcome.content, "Function call successfully.");
        assert!(outcome.agent.is_none());
        assert!(outcome.copy_history);
        assert!(outcome.context_variables.is_empty());
        assert_eq!(Outcome::from(ToolOutput::Done), outcome);
    }

    #[test]
    fn test_normalize_outputs() {
        let outcome = Outcome::from(ToolOutput::from("x"));
        assert_eq!(outcome, Outcome::new().with_content("x"));

        let delta = ContextVariables::from([("city", "Nanjing")]);
        let outcome = Outcome::from(ToolOutput::from(delta.clone()));
        assert_eq!(outcome.content, DEFAULT_CONTENT);
        assert_eq!(outcome.context_variables, delta);

        let explicit = Outcome::new()
            .with_content("moved")
            .with_copy_history(false);
        assert_eq!(Outcome::from(ToolOutput::from(explicit.clone())), explicit);
    }

    #[test]
    fn test_trace_value_redaction() {
        assert_eq!(
            Outcome::new().with_content("ok").to_trace_value(),
            json!({ "content": "ok" })
        );
        assert_eq!(
            Outcome::new()
                .with_context_variables([("k", 1)])
                .with_copy_history(false)
                .to_trace_value(),
            json!({
                "content": DEFAULT_CONTENT,
                "context_variables": { "k": 1 },
                "copy_history": false
            })
        );
    }
}
