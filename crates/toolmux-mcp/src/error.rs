//! Error types for MCP operations.

use thiserror::Error;

/// Errors from MCP server communication.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to connect to MCP server '{server}': {reason}")]
    Connection { server: String, reason: String },

    #[error("MCP server '{server}' timed out after {timeout_ms}ms during {operation}")]
    Timeout {
        server: String,
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Failed to spawn MCP server '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("MCP connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("MCP server '{server}' is not initialized")]
    NotInitialized { server: String },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether this error belongs to the connection class: transport setup,
    /// handshake failure, dropped connection, or an expired deadline.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::SpawnFailed { .. }
                | Self::ConnectionClosed { .. }
                | Self::Http(_)
        )
    }

    /// Wrap a failure from `initialize()` so it names the server.
    ///
    /// Deadline expiry keeps its own variant.
    pub(crate) fn into_connection(self, server: &str) -> Self {
        match self {
            e @ (Self::Timeout { .. } | Self::Connection { .. }) => e,
            other => Self::Connection {
                server: server.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
