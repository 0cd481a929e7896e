//! Error hierarchy shared across toolmux crates.

use crate::tool::{ToolOutputContent, joined_text};
use thiserror::Error;

/// Errors from tool invocation.
///
/// This is the single failure contract that consumers of a tool see,
/// whichever transport the tool is reached through.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid input for tool '{tool}': {message}")]
    Schema { tool: String, message: String },

    #[error("Tool '{tool}' reported an error: {}", joined_text(.content))]
    Remote {
        tool: String,
        content: Vec<ToolOutputContent>,
    },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Server '{server}' is not initialized")]
    NotInitialized { server: String },

    #[error("Server '{server}' backing tool '{tool}' has been shut down")]
    SessionClosed { server: String, tool: String },
}

impl ToolError {
    /// Whether the failure was decided locally, before any transport I/O.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Schema { .. } | Self::UnknownTool { .. })
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown transport kind '{kind}' for server '{server}'")]
    UnknownKind { server: String, kind: String },

    #[error("Server '{server}' is configured as '{found}', expected '{expected}'")]
    KindMismatch {
        server: String,
        expected: &'static str,
        found: String,
    },

    #[error("Server '{server}' is missing required field '{field}'")]
    MissingField { server: String, field: &'static str },

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },
}
