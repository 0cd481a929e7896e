//! Tool trait and related types.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Name, description and input schema advertised for a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The output content blocks.
    pub content: Vec<ToolOutputContent>,
    /// Whether the tool execution resulted in an error.
    pub is_error: bool,
}

/// A single piece of tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolOutputContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Content kinds this crate does not interpret (audio, embedded resources).
    #[serde(other)]
    Unsupported,
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolOutputContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an error text output.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolOutputContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// All text blocks joined with newlines.
    pub fn text_content(&self) -> String {
        joined_text(&self.content)
    }
}

/// Join the text blocks of a content list with newlines, skipping non-text blocks.
pub fn joined_text(content: &[ToolOutputContent]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            ToolOutputContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A boxed, sendable future returned by dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait implemented by every invocable tool.
///
/// Dyn-compatible so an orchestrator can hold `Vec<Box<dyn Tool>>` built from
/// any number of servers.
pub trait Tool: Send + Sync {
    /// The name of this tool as advertised by its server.
    fn name(&self) -> &str;

    /// The tool definition to hand to a model (name, description, input schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input.
    fn execute(
        &self,
        input: serde_json::Value,
    ) -> BoxFuture<'_, Result<ToolOutput, crate::error::ToolError>>;
}
