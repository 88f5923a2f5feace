use std::sync::Arc;

use baton_model::{ModelProvider, ToolChoice};

use super::{Agent, Instruction};
use crate::model_client::ModelClient;
use crate::tool::{Tool, ToolObject, ToolObjectImpl};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) name: String,
    pub(crate) model_client: ModelClient,
    pub(crate) instruction: Instruction,
    pub(crate) tools: Vec<Arc<dyn ToolObject>>,
    pub(crate) tool_choice: Option<ToolChoice>,
    pub(crate) parallel_tool_calls: Option<bool>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<S, P>(name: S, provider: P) -> Self
    where
        S: Into<String>,
        P: ModelProvider + 'static,
    {
        Self::with_model_client(name, ModelClient::new(provider))
    }

    /// Creates a new builder with a model client shared with other agents.
    #[inline]
    pub fn with_model_client<S: Into<String>>(
        name: S,
        model_client: ModelClient,
    ) -> Self {
        Self {
            name: name.into(),
            model_client,
            instruction: Instruction::default(),
            tools: vec![],
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }

    /// Sets the instruction.
    #[inline]
    pub fn with_instruction<I: Into<Instruction>>(
        mut self,
        instruction: I,
    ) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(ToolObjectImpl(tool)));
        self
    }

    /// Sets the tool-choice policy.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Sets whether the model may request several tool calls at once.
    #[inline]
    pub fn with_parallel_tool_calls(
        mut self,
        parallel_tool_calls: bool,
    ) -> Self {
        self.parallel_tool_calls = Some(parallel_tool_calls);
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
