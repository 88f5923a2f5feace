use std::sync::Arc;

use async_trait::async_trait;
use baton_model::{ModelMessage, ToolChoice};
use baton_test_model::{PresetResponse, TestModelProvider};
use serde_json::{Map, Value, json};

use crate::remote::{ContentPart, RemoteError, RemoteTool, RemoteToolProvider};
use crate::tool::{FunctionTool, ToolOutput};
use crate::{AgentBuilder, ContextVariables, Instruction};

struct FixedRemote(Vec<&'static str>);

#[async_trait]
impl RemoteToolProvider for FixedRemote {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn list_tools(&self) -> Result<Vec<RemoteTool>, RemoteError> {
        Ok(self
            .0
            .iter()
            .map(|name| RemoteTool {
                name: (*name).to_owned(),
                description: format!("remote {name}"),
                input_schema: json!({ "type": "object" }),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        _arguments: Map<String, Value>,
    ) -> Result<Vec<ContentPart>, RemoteError> {
        Ok(vec![ContentPart::Text(name.to_owned())])
    }
}

fn new_agent(name: &str) -> crate::Agent {
    let provider = TestModelProvider::default();
    AgentBuilder::with_model_provider(name, provider).build()
}

fn noop_tool(name: &str, description: &str) -> FunctionTool {
    FunctionTool::new(
        name,
        description,
        json!({ "type": "object", "properties": {} }),
        |_, _| async { Ok(ToolOutput::Done) },
    )
}

#[tokio::test]
async fn test_simple_chat() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Hi, what can I do?"));

    let agent =
        AgentBuilder::with_model_provider("greeter", model_provider.clone())
            .with_instruction("Be brief.")
            .build();
    let completion = agent.chat(Some("Hello")).await.unwrap();
    assert_eq!(completion.content.as_deref(), Some("Hi, what can I do?"));

    let messages = agent.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], ModelMessage::user("Hello"));
    assert_eq!(
        messages[1],
        ModelMessage::assistant(
            "Hi, what can I do?",
            Some("greeter".to_owned())
        )
    );

    // The system prompt is sent but never stored.
    let requests = model_provider.requests();
    assert_eq!(requests[0].messages[0], ModelMessage::system("Be brief."));
    assert!(requests[0].tools.is_empty());
}

#[test]
fn test_default_instruction_and_identity() {
    let agent = new_agent("a");
    assert_eq!(agent.system_prompt(), "You are a helpful assistant.");

    let other = new_agent("a");
    assert_ne!(agent, other);
    assert_ne!(agent.id(), other.id());
    assert_eq!(agent, agent.clone());
}

#[test]
fn test_dynamic_instruction() {
    let agent =
        AgentBuilder::with_model_provider("a", TestModelProvider::default())
            .with_instruction(Instruction::dynamic(|ctx| {
                let user = ctx.get_as::<String>("user").unwrap_or_default();
                format!("Help {user}.")
            }))
            .build();
    let ctx = ContextVariables::from([("user", "Alice")]);
    assert_eq!(agent.resolve_instruction(&ctx), "Help Alice.");
    assert_eq!(agent.system_prompt(), "Help Alice.");
}

#[tokio::test]
async fn test_tool_registry() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("ok"));
    let agent = AgentBuilder::with_model_provider("a", model_provider.clone())
        .with_tool(noop_tool("search", "first"))
        .with_tool_choice(ToolChoice::Required)
        .with_parallel_tool_calls(false)
        .build();

    let added = agent
        .add_remote_tools(Arc::new(FixedRemote(vec!["search", "fetch"])))
        .await
        .unwrap();
    assert_eq!(added, 1);
    agent.add_tool(
        noop_tool("context", "injected")
            .with_context_variables("context_variables"),
    );
    // Same name in the same registry overwrites.
    agent.add_tool(noop_tool("search", "second"));
    // A remote name cannot be shadowed by a local tool.
    agent.add_tool(noop_tool("fetch", "local"));

    assert_eq!(agent.tool_names(), ["search", "context", "fetch"]);
    assert!(agent.set_tool_description("fetch", "Fetch a page."));
    assert!(!agent.set_tool_description("missing", "nothing"));

    agent.chat(None).await.unwrap();
    let req = &model_provider.requests()[0];
    let descriptions: Vec<_> =
        req.tools.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(descriptions, ["second", "injected", "Fetch a page."]);
    assert_eq!(req.tool_choice, Some(ToolChoice::Required));
    assert_eq!(req.parallel_tool_calls, Some(false));
}

#[test]
fn test_history_operations() {
    let agent = new_agent("a");
    agent.add_user_message("question");
    agent.add_assistant_message("answer", Some("b"));
    agent.add_tool_message("result", "call_1");
    assert_eq!(
        agent.messages(),
        vec![
            ModelMessage::user("question"),
            ModelMessage::assistant("answer", Some("b".to_owned())),
            ModelMessage::tool("call_1", "result"),
        ]
    );
    assert_eq!(
        agent.last_message(),
        Some(ModelMessage::tool("call_1", "result"))
    );

    agent.set_messages(vec![ModelMessage::user("fresh")]);
    assert_eq!(agent.messages().len(), 1);
    agent.clear_messages();
    assert!(agent.messages().is_empty());
}
