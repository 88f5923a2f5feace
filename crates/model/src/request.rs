use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// How the model should pick tools. `None` leaves it to the provider.
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may request several tool calls in one response.
    /// `None` leaves it to the provider.
    pub parallel_tool_calls: Option<bool>,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user input text.
    User {
        /// The input text.
        content: String,
    },
    /// An assistant turn, possibly requesting tool calls.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates a text-only assistant message, optionally attributed to a
    /// named participant.
    #[inline]
    pub fn assistant<S: Into<String>>(
        content: S,
        name: Option<String>,
    ) -> Self {
        Self::Assistant(AssistantMessage {
            content: Some(content.into()),
            name,
            tool_calls: vec![],
        })
    }

    /// Creates a tool result message.
    #[inline]
    pub fn tool<S1, S2>(id: S1, content: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::Tool(ToolCallResult {
            id: id.into(),
            content: content.into(),
        })
    }

    /// Returns the text content of this message, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ModelMessage::System { content }
            | ModelMessage::User { content } => Some(content.as_str()),
            ModelMessage::Assistant(msg) => msg.content.as_deref(),
            ModelMessage::Tool(result) => Some(result.content.as_str()),
        }
    }
}

/// A message produced by the assistant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// The text content, `None` when the model only requested tools.
    pub content: Option<String>,
    /// The participant that produced this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls requested in this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    #[serde(rename = "tool_call_id")]
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

impl ModelTool {
    /// Reads a tool from an OpenAI-style function-calling object, either
    /// the `{"type": "function", "function": {...}}` wrapper or the bare
    /// `{"name", "description", "parameters"}` object.
    ///
    /// The bare inner `function` object is accepted as well.
    pub fn from_function_schema(schema: &Value) -> Option<Self> {
        let function = schema.get("function").unwrap_or(schema);
        let name = function.get("name")?.as_str()?.to_owned();
        let description = function
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let parameters = function
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| json!({}));
        Some(Self {
            name,
            description,
            parameters,
        })
    }

    /// Converts this tool into an OpenAI-style function-calling object.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Controls whether and which tools the model may call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
    /// The model must call the named tool.
    Named(String),
}

impl ToolChoice {
    /// Converts the choice into the value used by OpenAI-style APIs.
    pub fn to_value(&self) -> Value {
        match self {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Required => json!("required"),
            ToolChoice::None => json!("none"),
            ToolChoice::Named(name) => json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }
}

impl FromStr for ToolChoice {
    type Err = Infallible;

    /// Keywords map to their variants, any other string names a function.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" => ToolChoice::Auto,
            "required" => ToolChoice::Required,
            "none" => ToolChoice::None,
            name => ToolChoice::Named(name.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_choice_from_str() {
        assert_eq!("auto".parse::<ToolChoice>().unwrap(), ToolChoice::Auto);
        assert_eq!("none".parse::<ToolChoice>().unwrap(), ToolChoice::None);
        assert_eq!(
            "get_weather".parse::<ToolChoice>().unwrap(),
            ToolChoice::Named("get_weather".to_owned())
        );
        assert_eq!(
            ToolChoice::Named("get_weather".to_owned()).to_value(),
            json!({"type": "function", "function": {"name": "get_weather"}})
        );
    }

    #[test]
    fn test_function_schema() {
        let schema = json!({
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Looks up the weather.",
                "parameters": {
                    "type": "object",
                    "properties": { "city": { "type": "string" } },
                    "required": ["city"]
                }
            }
        });
        let tool = ModelTool::from_function_schema(&schema).unwrap();
        assert_eq!(tool.name, "get_weather");
        assert_eq!(tool.description, "Looks up the weather.");
        assert_eq!(tool.to_function_schema(), schema);

        let missing = json!({"type": "function"});
        assert!(ModelTool::from_function_schema(&missing).is_none());
    }

    #[test]
    fn test_message_wire_shape() {
        let msg = ModelMessage::tool("call_1", "sunny");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "tool",
                "tool_call_id": "call_1",
                "content": "sunny"
            })
        );

        let msg = ModelMessage::assistant("hi", Some("writer".to_owned()));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "hi", "name": "writer"})
        );
        assert_eq!(msg.content(), Some("hi"));
    }
}
