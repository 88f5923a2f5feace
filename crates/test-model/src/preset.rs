use baton_model::ToolCallRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for one chat-completion request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts with
    /// a rate-limit error. `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a plain text response.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a response that requests a single tool call.
    #[inline]
    pub fn tool_call<S1, S2>(id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::with_events([PresetEvent::tool_call(id, name, arguments)])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

impl PresetEvent {
    /// Creates a tool call event, encoding `arguments` the way a model
    /// would (as a JSON string).
    #[inline]
    pub fn tool_call<S1, S2>(id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let arguments = arguments.to_string();
        PresetEvent::ToolCall(ToolCallRequest::new(id, name, arguments))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me check the weather.".to_string()),
            PresetEvent::tool_call(
                "call_1",
                "get_weather",
                json!({ "city": "Nanjing" }),
            ),
        ])
        .with_failures(2);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
