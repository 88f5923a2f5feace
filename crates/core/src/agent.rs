mod builder;
mod instruction;
#[cfg(test)]
mod tests;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use baton_model::{
    AssistantMessage, ModelFinishReason, ModelMessage, ModelRequest,
    ModelTool, ToolChoice,
};
use serde_json::{Map, Value};

use crate::context::ContextVariables;
use crate::error::Error;
use crate::model_client::{ChatCompletion, ModelClient, RetryConfig};
use crate::remote::{RemoteError, RemoteToolProvider};
use crate::tool::{
    FunctionTool, Injected, Tool, ToolObject, ToolObjectImpl, ToolResult,
};
pub use builder::AgentBuilder;
pub use instruction::{DEFAULT_INSTRUCTION, Instruction};

static NEXT_AGENT_ID: AtomicU64 = AtomicU64::new(1);

/// A tool resolved from an agent's registry.
#[derive(Clone)]
pub(crate) enum ToolBinding {
    Local(Arc<dyn ToolObject>),
    Remote(Arc<dyn RemoteToolProvider>),
}

struct RegisteredTool {
    binding: ToolBinding,
    definition: ModelTool,
}

impl RegisteredTool {
    #[inline]
    fn is_local(&self) -> bool {
        matches!(self.binding, ToolBinding::Local(_))
    }
}

struct AgentState {
    instruction: Instruction,
    system_prompt: String,
    tools: Vec<RegisteredTool>,
    tool_choice: Option<ToolChoice>,
    parallel_tool_calls: Option<bool>,
    messages: Vec<ModelMessage>,
}

struct AgentInner {
    id: u64,
    name: String,
    client: ModelClient,
    state: Mutex<AgentState>,
}

/// An agent: a named identity with an instruction, a tool registry and a
/// conversation history, bound to a model client.
///
/// `Agent` is a handle. Clones refer to the same agent, and two handles are
/// equal only if they refer to the same agent. Agents are meant to be
/// driven by one [`Controller`](crate::Controller) at a time; running the
/// same agent from two controllers concurrently interleaves their
/// histories.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            name,
            model_client,
            instruction,
            tools,
            tool_choice,
            parallel_tool_calls,
        } = builder;

        let system_prompt = instruction.resolve(&ContextVariables::new());
        let agent = Self {
            inner: Arc::new(AgentInner {
                id: NEXT_AGENT_ID.fetch_add(1, Ordering::Relaxed),
                name,
                client: model_client,
                state: Mutex::new(AgentState {
                    instruction,
                    system_prompt,
                    tools: vec![],
                    tool_choice,
                    parallel_tool_calls,
                    messages: vec![],
                }),
            }),
        };
        for tool in tools {
            agent.register_local(tool);
        }
        agent
    }

    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the process-unique id of the agent.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the model client of the agent.
    #[inline]
    pub fn model_client(&self) -> &ModelClient {
        &self.inner.client
    }

    /// Returns the instruction of the agent.
    pub fn instruction(&self) -> Instruction {
        self.lock().instruction.clone()
    }

    /// Replaces the instruction.
    ///
    /// A static instruction takes effect immediately; a dynamic one is
    /// evaluated the next time a controller resolves it.
    pub fn set_instruction<I: Into<Instruction>>(&self, instruction: I) {
        let instruction = instruction.into();
        let mut state = self.lock();
        if let Instruction::Static(text) = &instruction {
            state.system_prompt.clone_from(text);
        }
        state.instruction = instruction;
    }

    /// Evaluates the instruction against `context_variables` and makes the
    /// result the active system prompt.
    pub fn resolve_instruction(
        &self,
        context_variables: &ContextVariables,
    ) -> String {
        let instruction = self.instruction();
        // The dynamic instruction runs without the lock held, so it may
        // inspect this agent.
        let system_prompt = instruction.resolve(context_variables);
        self.lock().system_prompt.clone_from(&system_prompt);
        system_prompt
    }

    /// Returns the active system prompt.
    pub fn system_prompt(&self) -> String {
        self.lock().system_prompt.clone()
    }

    /// Returns the tool-choice policy.
    pub fn tool_choice(&self) -> Option<ToolChoice> {
        self.lock().tool_choice.clone()
    }

    /// Sets the tool-choice policy. `None` leaves it to the provider.
    pub fn set_tool_choice(&self, tool_choice: Option<ToolChoice>) {
        self.lock().tool_choice = tool_choice;
    }

    /// Returns whether the model may request several tool calls at once.
    pub fn parallel_tool_calls(&self) -> Option<bool> {
        self.lock().parallel_tool_calls
    }

    /// Sets whether the model may request several tool calls at once.
    pub fn set_parallel_tool_calls(&self, parallel_tool_calls: Option<bool>) {
        self.lock().parallel_tool_calls = parallel_tool_calls;
    }
}

// Tool registry.
impl Agent {
    /// Registers a tool.
    ///
    /// Registering a name again replaces the earlier tool. A name that is
    /// already bound to a remote tool is left untouched.
    pub fn add_tool<T: Tool>(&self, tool: T) {
        self.register_local(Arc::new(ToolObjectImpl(tool)));
    }

    /// Registers a tool backed by a closure. See [`FunctionTool::new`].
    pub fn add_function_tool<N, D, F, Fut>(
        &self,
        name: N,
        description: D,
        parameter_schema: Value,
        handler: F,
    ) where
        N: Into<String>,
        D: Into<String>,
        F: Fn(Map<String, Value>, Injected) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        self.add_tool(FunctionTool::new(
            name,
            description,
            parameter_schema,
            handler,
        ));
    }

    /// Lists the tools of a remote provider and registers each of them.
    ///
    /// Names already bound to a local tool are skipped. Returns the number
    /// of tools registered.
    pub async fn add_remote_tools(
        &self,
        provider: Arc<dyn RemoteToolProvider>,
    ) -> Result<usize, RemoteError> {
        let remote_tools = provider.list_tools().await?;
        debug!(
            "agent {} got {} tools from {}",
            self.name(),
            remote_tools.len(),
            provider.name()
        );

        let mut registered = 0;
        for remote_tool in remote_tools {
            let definition = ModelTool {
                name: remote_tool.name,
                description: remote_tool.description,
                parameters: remote_tool.input_schema,
            };
            let binding = ToolBinding::Remote(Arc::clone(&provider));
            if self.register(binding, definition) {
                registered += 1;
            }
        }
        Ok(registered)
    }

    fn register_local(&self, tool: Arc<dyn ToolObject>) {
        let definition = ModelTool {
            name: tool.name().to_owned(),
            description: tool.description().to_owned(),
            parameters: tool.injection().strip_schema(tool.parameter_schema()),
        };
        self.register(ToolBinding::Local(tool), definition);
    }

    fn register(&self, binding: ToolBinding, definition: ModelTool) -> bool {
        let entry = RegisteredTool {
            binding,
            definition,
        };
        let mut state = self.lock();
        let existing = state
            .tools
            .iter_mut()
            .find(|tool| tool.definition.name == entry.definition.name);
        match existing {
            Some(existing) if existing.is_local() != entry.is_local() => {
                warn!(
                    "agent {}: tool {} is already registered, skipping",
                    self.inner.name, entry.definition.name
                );
                false
            }
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                state.tools.push(entry);
                true
            }
        }
    }

    /// Replaces the description the model sees for a tool.
    ///
    /// Returns `false` if no tool has that name.
    pub fn set_tool_description<S: Into<String>>(
        &self,
        name: &str,
        description: S,
    ) -> bool {
        let mut state = self.lock();
        match state
            .tools
            .iter_mut()
            .find(|tool| tool.definition.name == name)
        {
            Some(tool) => {
                tool.definition.description = description.into();
                true
            }
            None => false,
        }
    }

    /// Returns the names of the registered tools, local tools first.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect()
    }

    /// Returns the tool definitions sent to the model, local tools first.
    pub fn tool_definitions(&self) -> Vec<ModelTool> {
        let state = self.lock();
        let local = state.tools.iter().filter(|tool| tool.is_local());
        let remote = state.tools.iter().filter(|tool| !tool.is_local());
        local
            .chain(remote)
            .map(|tool| tool.definition.clone())
            .collect()
    }

    pub(crate) fn resolve_tool(&self, name: &str) -> Option<ToolBinding> {
        self.lock()
            .tools
            .iter()
            .find(|tool| tool.definition.name == name)
            .map(|tool| tool.binding.clone())
    }
}

// Conversation history.
impl Agent {
    /// Returns a copy of the conversation history.
    pub fn messages(&self) -> Vec<ModelMessage> {
        self.lock().messages.clone()
    }

    /// Returns the last message of the history.
    pub fn last_message(&self) -> Option<ModelMessage> {
        self.lock().messages.last().cloned()
    }

    /// Replaces the conversation history.
    pub fn set_messages(&self, messages: Vec<ModelMessage>) {
        self.lock().messages = messages;
    }

    /// Appends a message to the history.
    pub fn add_message(&self, message: ModelMessage) {
        self.lock().messages.push(message);
    }

    /// Appends a user message.
    pub fn add_user_message<S: Into<String>>(&self, content: S) {
        self.add_message(ModelMessage::user(content));
    }

    /// Appends an assistant message, optionally attributed to `name`.
    pub fn add_assistant_message<S: Into<String>>(
        &self,
        content: S,
        name: Option<&str>,
    ) {
        self.add_message(ModelMessage::assistant(
            content,
            name.map(str::to_owned),
        ));
    }

    /// Appends a tool message answering the call `call_id`.
    pub fn add_tool_message<S1, S2>(&self, content: S1, call_id: S2)
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.add_message(ModelMessage::tool(call_id, content));
    }

    /// Clears the conversation history.
    pub fn clear_messages(&self) {
        self.lock().messages.clear();
    }

    /// Sends the history to the model and appends the reply.
    ///
    /// If `message` is given, it is appended as a user message first. The
    /// active system prompt is prepended to the request but never stored in
    /// the history.
    pub async fn chat(
        &self,
        message: Option<&str>,
    ) -> Result<ChatCompletion, Error> {
        self.chat_with_retry(message, &RetryConfig::default()).await
    }

    pub(crate) async fn chat_with_retry(
        &self,
        message: Option<&str>,
        retry: &RetryConfig,
    ) -> Result<ChatCompletion, Error> {
        if let Some(message) = message {
            self.add_user_message(message);
        }
        let req = self.make_request();
        let completion = self
            .inner
            .client
            .send_request(&req, retry)
            .await
            .map_err(Error::Model)?;
        if completion.finish_reason == Some(ModelFinishReason::Length) {
            warn!("reply of agent {} was truncated", self.inner.name);
        }

        self.add_message(ModelMessage::Assistant(AssistantMessage {
            content: completion.content.clone(),
            name: Some(self.inner.name.clone()),
            tool_calls: completion.tool_calls.clone(),
        }));
        Ok(completion)
    }

    fn make_request(&self) -> ModelRequest {
        let tools = self.tool_definitions();
        let state = self.lock();
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(ModelMessage::system(state.system_prompt.clone()));
        messages.extend(state.messages.iter().cloned());

        let has_tools = !tools.is_empty();
        ModelRequest {
            messages,
            tools,
            tool_choice: state.tool_choice.clone().filter(|_| has_tools),
            parallel_tool_calls: state
                .parallel_tool_calls
                .filter(|_| has_tools),
        }
    }
}

impl PartialEq for Agent {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
