//! Conversions from MCP model types to the remote tool types of
//! `baton-core`.

use std::borrow::Cow;
use std::sync::Arc;

use baton_core::remote::{ContentPart, RemoteTool};
use rmcp::model::{Content, RawContent, ResourceContents, Tool};
use serde_json::Value;

/// Converts a listed tool. A missing description becomes empty.
pub(crate) fn remote_tool(tool: Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.into_owned(),
        description: tool.description.map(Cow::into_owned).unwrap_or_default(),
        input_schema: Value::Object(Arc::unwrap_or_clone(tool.input_schema)),
    }
}

/// Converts one part of a tool result, or returns `None` for part types
/// that have no text representation.
pub(crate) fn content_part(content: Content) -> Option<ContentPart> {
    match content.raw {
        RawContent::Text(text) => Some(ContentPart::Text(text.text)),
        RawContent::Image(image) => Some(ContentPart::Image {
            data: image.data,
            mime_type: image.mime_type,
        }),
        RawContent::Resource(embedded) => {
            // Blob-only resources are represented by their URI.
            let text = match embedded.resource {
                ResourceContents::TextResourceContents { text, .. } => text,
                ResourceContents::BlobResourceContents { uri, .. } => uri,
            };
            Some(ContentPart::EmbeddedResource { text: Some(text) })
        }
        _ => None,
    }
}
