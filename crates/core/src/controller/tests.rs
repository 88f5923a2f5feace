use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use baton_model::{ModelMessage, ToolCallRequest};
use baton_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde_json::{Map, Value, json};

use crate::remote::{ContentPart, RemoteError, RemoteTool, RemoteToolProvider};
use crate::tool::{self, FunctionTool, Outcome, ToolOutput};
use crate::trace::{TraceEvent, TraceEventKind};
use crate::{
    Abort, Agent, AgentBuilder, ContextVariables, ControllerBuilder, Error,
    Instruction,
};

fn city_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "city": { "type": "string" } },
        "required": ["city"]
    })
}

fn weather_tool(explicit: bool) -> FunctionTool {
    FunctionTool::new(
        "get_weather",
        "Get the weather of a city.",
        city_schema(),
        move |args, _| async move {
            let city = args["city"].as_str().unwrap_or_default().to_owned();
            let content = format!("{city}: sunny");
            if explicit {
                Ok(ToolOutput::from(Outcome::new().with_content(content)))
            } else {
                Ok(ToolOutput::from(content))
            }
        },
    )
}

fn kinds(events: &[TraceEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event.kind {
            TraceEventKind::UserMessage { .. } => "user_message",
            TraceEventKind::AgentMessage { .. } => "agent_message",
            TraceEventKind::ToolCall { .. } => "tool_call",
            TraceEventKind::ToolResult { .. } => "tool_result",
            TraceEventKind::McpToolCall { .. } => "mcp_tool_call",
            TraceEventKind::AgentSwitch { .. } => "agent_switch",
            TraceEventKind::ContextUpdate { .. } => "context_update",
        })
        .collect()
}

async fn run_weather(explicit: bool) -> (Agent, Vec<TraceEvent>, String) {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "get_weather",
        json!({ "city": "Nanjing" }),
    ));
    model_provider.add_response(PresetResponse::text("It's sunny in Nanjing."));

    let agent =
        AgentBuilder::with_model_provider("weather_agent", model_provider)
            .with_tool(weather_tool(explicit))
            .build();

    let sunk = Arc::new(Mutex::new(vec![]));
    let mut controller = ControllerBuilder::new()
        .on_trace({
            let sunk = Arc::clone(&sunk);
            move |event| sunk.lock().unwrap().push(event.clone())
        })
        .build();
    let resp = controller
        .run(&agent, Some("weather in Nanjing?"))
        .await
        .unwrap();
    assert_eq!(resp.agent, agent);
    assert_eq!(resp.turns, 2);
    assert!(controller.trace().end_time.is_some());
    assert_eq!(*sunk.lock().unwrap(), controller.trace().events);

    let message = resp.message.unwrap_or_default();
    (agent, controller.trace().events.clone(), message)
}

#[tokio::test]
async fn test_weather_agent() {
    let (agent, events, message) = run_weather(false).await;
    assert_eq!(message, "It's sunny in Nanjing.");
    assert_eq!(
        kinds(&events),
        ["user_message", "tool_call", "tool_result", "agent_message"]
    );
    assert_eq!(
        events[2].kind,
        TraceEventKind::ToolResult {
            id: "call_1".to_owned(),
            name: "get_weather".to_owned(),
            result: json!({ "content": "Nanjing: sunny" }),
        }
    );
    assert_eq!(
        agent.messages()[2],
        ModelMessage::tool("call_1", "Nanjing: sunny")
    );
}

#[tokio::test]
async fn test_text_and_outcome_are_equivalent() {
    let (implicit, _, _) = run_weather(false).await;
    let (explicit, _, _) = run_weather(true).await;
    assert_eq!(implicit.messages(), explicit.messages());
}

#[tokio::test]
async fn test_turn_counting() {
    let model_provider = TestModelProvider::default();
    let rounds = 4;
    for i in 0..rounds {
        model_provider.add_response(PresetResponse::tool_call(
            format!("call_{i}"),
            "get_weather",
            json!({ "city": "Beijing" }),
        ));
    }
    model_provider.add_response(PresetResponse::text("done"));

    let agent = AgentBuilder::with_model_provider("a", model_provider.clone())
        .with_tool(weather_tool(false))
        .build();
    let mut controller = ControllerBuilder::new().build();
    let resp = controller.run(&agent, Some("go")).await.unwrap();
    assert_eq!(resp.turns, rounds + 1);
    assert_eq!(model_provider.request_count(), rounds + 1);
}

#[tokio::test]
async fn test_max_turns_abort() {
    let model_provider = TestModelProvider::default();
    for i in 0..3 {
        model_provider.add_response(PresetResponse::tool_call(
            format!("call_{i}"),
            "get_weather",
            json!({ "city": "Beijing" }),
        ));
    }

    let agent = AgentBuilder::with_model_provider("a", model_provider.clone())
        .with_tool(weather_tool(false))
        .build();
    let mut controller = ControllerBuilder::new().with_max_turns(2).build();
    let err = controller.run(&agent, Some("go")).await.unwrap_err();
    assert_eq!(err.as_abort(), Some(Abort::MaxTurns(2)));
    assert_eq!(model_provider.request_count(), 2);
    // Work done before the abort stays committed.
    assert_eq!(
        agent.last_message(),
        Some(ModelMessage::tool("call_1", "Beijing: sunny"))
    );
}

#[tokio::test]
async fn test_handoff_copies_history() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "transfer",
        json!({}),
    ));
    model_provider.add_response(PresetResponse::text("I am B."));

    let b = AgentBuilder::with_model_provider("b", model_provider.clone())
        .with_instruction("You are B.")
        .build();
    let a = AgentBuilder::with_model_provider("a", model_provider.clone())
        .with_tool(FunctionTool::new(
            "transfer",
            "Transfer to B.",
            json!({ "type": "object", "properties": {} }),
            {
                let b = b.clone();
                move |_, _| {
                    let b = b.clone();
                    async move { Ok(ToolOutput::from(b)) }
                }
            },
        ))
        .build();

    let mut controller = ControllerBuilder::new().build();
    let resp = controller.run(&a, Some("hello")).await.unwrap();
    assert_eq!(resp.agent, b);
    assert_eq!(resp.message.as_deref(), Some("I am B."));

    let a_messages = a.messages();
    assert_eq!(a_messages.len(), 3);
    assert_eq!(
        a_messages[2],
        ModelMessage::tool("call_1", r#"{"assistant":"b"}"#)
    );
    let b_messages = b.messages();
    assert_eq!(b_messages[..3], a_messages[..]);
    assert_eq!(
        b_messages[3],
        ModelMessage::assistant("I am B.", Some("b".to_owned()))
    );

    let switches: Vec<_> = controller
        .trace()
        .events_matching(|kind| {
            matches!(kind, TraceEventKind::AgentSwitch { .. })
        })
        .collect();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].agent.name, "a");
    assert_eq!(
        switches[0].kind,
        TraceEventKind::AgentSwitch {
            to: (&b).into(),
            copy_history: true,
        }
    );

    // The second request went out with B's instruction.
    let requests = model_provider.requests();
    assert_eq!(requests[1].messages[0], ModelMessage::system("You are B."));
}

#[tokio::test]
async fn test_later_calls_run_on_new_agent() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_1", "go_b", json!({})),
        PresetEvent::tool_call("call_2", "note", json!({})),
    ]));
    model_provider.add_response(PresetResponse::text("noted"));

    let b = AgentBuilder::with_model_provider("b", model_provider.clone())
        .build();
    b.add_function_tool("note", "Take a note.", json!({}), |_, _| async {
        Ok(ToolOutput::from("from b"))
    });
    let a = AgentBuilder::with_model_provider("a", model_provider).build();
    a.add_function_tool("go_b", "Go to B.", json!({}), {
        let b = b.clone();
        move |_, _| {
            let outcome = Outcome::new()
                .with_content("to b")
                .with_agent(b.clone())
                .with_copy_history(false);
            async move { Ok(ToolOutput::from(outcome)) }
        }
    });

    let mut controller = ControllerBuilder::new().build();
    let resp = controller.run(&a, Some("hello")).await.unwrap();
    assert_eq!(resp.agent, b);

    // The second call of the batch was applied to B, which started empty.
    let b_messages = b.messages();
    assert_eq!(b_messages[0], ModelMessage::tool("call_2", "from b"));
    assert_eq!(
        b_messages[1],
        ModelMessage::assistant("noted", Some("b".to_owned()))
    );
    let a_messages = a.messages();
    assert_eq!(a_messages.len(), 3);
    assert_eq!(a_messages[2], ModelMessage::tool("call_1", "to b"));
}

#[tokio::test]
async fn test_handoff_to_self_is_noop() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "stay",
        json!({}),
    ));
    model_provider.add_response(PresetResponse::text("still here"));

    let a = AgentBuilder::with_model_provider("a", model_provider).build();
    a.add_tool(
        FunctionTool::new(
            "stay",
            "Stay with the same agent.",
            json!({ "type": "object" }),
            |_, injected| async move {
                let agent =
                    injected.agent.ok_or_else(tool::Error::execution_error)?;
                Ok(ToolOutput::from(agent))
            },
        )
        .with_agent("agent"),
    );

    let mut controller = ControllerBuilder::new().build();
    let resp = controller.run(&a, None).await.unwrap();
    assert_eq!(resp.agent, a);
    assert!(
        controller
            .trace()
            .events_matching(|kind| matches!(
                kind,
                TraceEventKind::AgentSwitch { .. }
            ))
            .next()
            .is_none()
    );
}

#[tokio::test]
async fn test_unknown_tool() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "does_not_exist",
        json!({}),
    ));
    model_provider.add_response(PresetResponse::text("sorry"));

    let agent = AgentBuilder::with_model_provider("a", model_provider).build();
    let mut controller = ControllerBuilder::new().build();
    let resp = controller.run(&agent, Some("hi")).await.unwrap();
    assert_eq!(resp.message.as_deref(), Some("sorry"));
    assert_eq!(
        agent.messages()[2],
        ModelMessage::tool("call_1", "Failed to call tool: does_not_exist")
    );
    assert_eq!(
        kinds(&controller.trace().events),
        ["user_message", "agent_message"]
    );
}

#[tokio::test]
async fn test_invalid_arguments() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest::new(
            "call_1",
            "get_weather",
            "{\"city\": ",
        )),
    ]));

    let agent = AgentBuilder::with_model_provider("a", model_provider)
        .with_tool(weather_tool(false))
        .build();
    let mut controller = ControllerBuilder::new().build();
    let err = controller.run(&agent, Some("hi")).await.unwrap_err();
    match err {
        Error::InvalidArguments { tool, .. } => assert_eq!(tool, "get_weather"),
        err => panic!("unexpected error: {err}"),
    }
}

#[tokio::test]
async fn test_empty_arguments() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest::new("call_1", "ping", "")),
    ]));
    model_provider.add_response(PresetResponse::text("pong"));

    let agent = AgentBuilder::with_model_provider("a", model_provider).build();
    agent.add_function_tool("ping", "Ping.", json!({}), |args, _| async move {
        assert!(args.is_empty());
        Ok(ToolOutput::Done)
    });
    let mut controller = ControllerBuilder::new().build();
    controller.run(&agent, None).await.unwrap();
    assert_eq!(
        agent.messages()[1],
        ModelMessage::tool("call_1", "Function call successfully.")
    );
}

#[tokio::test]
async fn test_tool_error_propagates() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "explode",
        json!({}),
    ));

    let agent = AgentBuilder::with_model_provider("a", model_provider).build();
    agent.add_function_tool("explode", "", json!({}), |_, _| async {
        Err(tool::Error::execution_error().with_reason("boom"))
    });
    let mut controller = ControllerBuilder::new().build();
    let err = controller.run(&agent, None).await.unwrap_err();
    match err {
        Error::Tool { tool, source } => {
            assert_eq!(tool, "explode");
            assert_eq!(source.reason(), "boom");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[tokio::test]
async fn test_context_injection_and_update() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_1", "visit", json!({ "city": "Nanjing" })),
        PresetEvent::tool_call("call_2", "visit", json!({ "city": "Beijing" })),
    ]));
    model_provider.add_response(PresetResponse::text("done"));

    let agent = AgentBuilder::with_model_provider("a", model_provider.clone())
        .with_instruction(Instruction::dynamic(|ctx| {
            let visited =
                ctx.get("visited").cloned().unwrap_or_else(|| json!([]));
            format!("Visited: {visited}")
        }))
        .with_tool(
            FunctionTool::new(
                "visit",
                "Visit a city.",
                json!({
                    "type": "object",
                    "properties": {
                        "city": { "type": "string" },
                        "ctx": { "type": "object" }
                    },
                    "required": ["city", "ctx"]
                }),
                |args, injected| async move {
                    let ctx = injected.context_variables.unwrap_or_default();
                    let mut visited: Vec<String> =
                        ctx.get_as("visited").unwrap_or_default();
                    visited.push(args["city"].as_str().unwrap().to_owned());
                    Ok(ToolOutput::from(ContextVariables::from([(
                        "visited",
                        json!(visited),
                    )])))
                },
            )
            .with_context_variables("ctx"),
        )
        .build();

    let mut controller = ControllerBuilder::new()
        .with_context_variables([("user", "Alice")])
        .build();
    controller.run(&agent, None).await.unwrap();

    // Merges are applied in call order, so the second call saw the first.
    assert_eq!(
        controller.context_variables().get("visited"),
        Some(&json!(["Nanjing", "Beijing"]))
    );
    assert_eq!(
        controller.context_variables().get("user"),
        Some(&json!("Alice"))
    );

    let updates: Vec<_> = controller
        .trace()
        .events_matching(|kind| {
            matches!(kind, TraceEventKind::ContextUpdate { .. })
        })
        .collect();
    assert_eq!(updates.len(), 2);

    let requests = model_provider.requests();
    assert_eq!(
        requests[0].tools[0].parameters["required"],
        json!(["city"])
    );
    assert_eq!(
        requests[1].messages[0],
        ModelMessage::system("Visited: [\"Nanjing\",\"Beijing\"]")
    );
}

struct EchoRemote;

#[async_trait]
impl RemoteToolProvider for EchoRemote {
    fn name(&self) -> &str {
        "echo-server"
    }

    async fn list_tools(&self) -> Result<Vec<RemoteTool>, RemoteError> {
        Ok(vec![RemoteTool {
            name: "echo".to_owned(),
            description: "Echo the input.".to_owned(),
            input_schema: json!({ "type": "object" }),
        }])
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<ContentPart>, RemoteError> {
        let Some(text) = arguments.get("text").and_then(Value::as_str) else {
            return Err(RemoteError::new(format!("{name}: missing text")));
        };
        Ok(vec![
            ContentPart::Text(text.to_owned()),
            ContentPart::EmbeddedResource {
                text: Some("resource".to_owned()),
            },
        ])
    }
}

#[tokio::test]
async fn test_remote_tool() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "echo",
        json!({ "text": "hello" }),
    ));
    model_provider.add_response(PresetResponse::text("done"));
    model_provider.add_response(PresetResponse::tool_call(
        "call_2",
        "echo",
        json!({}),
    ));

    let agent = AgentBuilder::with_model_provider("a", model_provider).build();
    agent.add_remote_tools(Arc::new(EchoRemote)).await.unwrap();

    let mut controller = ControllerBuilder::new().build();
    controller.run(&agent, None).await.unwrap();
    assert_eq!(
        agent.messages()[1],
        ModelMessage::tool("call_1", "hello\nresource")
    );
    assert_eq!(
        kinds(&controller.trace().events),
        ["tool_call", "mcp_tool_call", "tool_result", "agent_message"]
    );

    controller.reset_trace();
    let err = controller.run(&agent, None).await.unwrap_err();
    assert!(matches!(err, Error::Remote { .. }));
}
