//! Tools served by a remote provider, such as an MCP server.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A tool advertised by a remote provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteTool {
    /// The name of the tool.
    pub name: String,
    /// The description of the tool.
    pub description: String,
    /// The JSON schema of the tool's input.
    pub input_schema: Value,
}

/// One part of a remote tool's result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// Base64-encoded image data.
    Image {
        /// The encoded data.
        data: String,
        /// The MIME type of the image.
        mime_type: String,
    },
    /// A resource embedded in the result.
    EmbeddedResource {
        /// The text of the resource, if it has one.
        text: Option<String>,
    },
}

impl ContentPart {
    /// Renders this part as text for the model.
    ///
    /// Images become their encoded data and resources their text.
    pub fn to_text(&self) -> &str {
        match self {
            ContentPart::Text(text) => text,
            ContentPart::Image { data, .. } => data,
            ContentPart::EmbeddedResource { text } => {
                text.as_deref().unwrap_or_default()
            }
        }
    }
}

/// Joins the parts of a remote result into the content of a tool message.
pub fn join_content(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .map(ContentPart::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// An error reported by a remote provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for RemoteError {}

/// A source of tools hosted outside the process.
///
/// Agents list the provider's tools when it is attached and forward calls
/// to it by name.
#[async_trait]
pub trait RemoteToolProvider: Send + Sync + 'static {
    /// A label for the provider, used in logs and traces.
    fn name(&self) -> &str;

    /// Lists the tools the provider serves.
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, RemoteError>;

    /// Calls a tool by name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<ContentPart>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_content() {
        let parts = vec![
            ContentPart::Text("first".to_owned()),
            ContentPart::Image {
                data: "aGk=".to_owned(),
                mime_type: "image/png".to_owned(),
            },
            ContentPart::EmbeddedResource {
                text: Some("doc".to_owned()),
            },
        ];
        assert_eq!(join_content(&parts), "first\naGk=\ndoc");
        assert_eq!(join_content(&[]), "");
    }
}
