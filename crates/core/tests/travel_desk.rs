//! A triage agent hands a traveller over to a booking agent, which books a
//! flight through a typed tool and records it in the shared context.

use baton_core::tool::{FunctionTool, Injected, Outcome, ToolOutput};
use baton_core::trace::{self, TraceEventKind};
use baton_core::{
    AgentBuilder, ContextVariables, ControllerBuilder, Instruction,
};
use baton_model::{ModelMessage, ToolChoice};
use baton_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize, JsonSchema)]
struct Booking {
    /// Departure city.
    from: String,
    /// Arrival city.
    to: String,
}

#[tokio::test]
async fn test_travel_desk() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Let me find someone.".to_owned()),
        PresetEvent::tool_call("call_1", "transfer_to_booking", json!({})),
    ]));
    model_provider.add_response(PresetResponse::tool_call(
        "call_2",
        "book_flight",
        json!({ "from": "Nanjing", "to": "Beijing" }),
    ));
    model_provider.add_response(PresetResponse::text("Booked NJ-BJ for you."));

    let booking_provider = model_provider.clone();
    let booking = AgentBuilder::with_model_provider(
        "booking",
        booking_provider.clone(),
    )
    .with_instruction(Instruction::dynamic(|ctx: &ContextVariables| {
        let user = ctx.get_as::<String>("user").unwrap_or_default();
        format!("Book flights for {user}.")
    }))
    .with_tool(
        FunctionTool::typed(
            "book_flight",
            "Book a flight.",
            |booking: Booking, injected: Injected| async move {
                let ctx = injected.context_variables.unwrap_or_default();
                let user = ctx.get_as::<String>("user").unwrap_or_default();
                let ticket =
                    format!("{}-{} for {user}", booking.from, booking.to);
                Ok(ToolOutput::from(
                    Outcome::new()
                        .with_content(format!("booked {ticket}"))
                        .with_context_variables([("ticket", ticket)]),
                ))
            },
        )
        .with_context_variables("context_variables"),
    )
    .with_tool_choice(ToolChoice::Auto)
    .build();

    let transfer = FunctionTool::new(
        "transfer_to_booking",
        "Hand the traveller to the booking desk.",
        json!({ "type": "object", "properties": {} }),
        {
            let booking = booking.clone();
            move |_, _| {
                let booking = booking.clone();
                async move { Ok(ToolOutput::from(booking)) }
            }
        },
    );
    let triage = AgentBuilder::with_model_provider("triage", model_provider)
        .with_tool(transfer)
        .build();

    let mut controller = ControllerBuilder::new()
        .with_context_variables([("user", "Alice")])
        .with_trace_sink(trace::log_events())
        .build();
    let resp = controller
        .run(&triage, Some("I need to fly to Beijing"))
        .await
        .unwrap();

    assert_eq!(resp.agent, booking);
    assert_eq!(resp.message.as_deref(), Some("Booked NJ-BJ for you."));
    assert_eq!(resp.turns, 3);
    assert_eq!(
        controller.context_variables().get("ticket"),
        Some(&json!("Nanjing-Beijing for Alice"))
    );

    // Triage kept its own history; booking got a copy plus its own work.
    assert_eq!(triage.messages().len(), 3);
    let booking_messages = booking.messages();
    assert_eq!(booking_messages[..3], triage.messages()[..]);
    assert_eq!(
        booking_messages[4],
        ModelMessage::tool("call_2", "booked Nanjing-Beijing for Alice")
    );

    let requests = booking_provider.requests();
    assert_eq!(
        requests[1].messages[0],
        ModelMessage::system("Book flights for Alice.")
    );
    let schema = &requests[1].tools[0].parameters;
    assert!(schema["properties"].get("context_variables").is_none());
    assert_eq!(schema["properties"]["from"]["type"], "string");

    let trace = controller.trace();
    let kinds: Vec<_> = trace
        .events
        .iter()
        .map(|event| serde_json::to_value(event).unwrap()["kind"].clone())
        .collect();
    assert_eq!(
        kinds,
        [
            "user_message",
            "agent_message",
            "tool_call",
            "tool_result",
            "agent_switch",
            "tool_call",
            "tool_result",
            "context_update",
            "agent_message",
        ]
    );
    let Some(TraceEventKind::ContextUpdate { previous, delta }) = trace
        .events
        .iter()
        .map(|event| &event.kind)
        .find(|kind| matches!(kind, TraceEventKind::ContextUpdate { .. }))
    else {
        panic!("missing context update");
    };
    assert_eq!(previous, &ContextVariables::from([("user", "Alice")]));
    assert_eq!(delta.len(), 1);
    assert!(trace.end_time.is_some());
}
