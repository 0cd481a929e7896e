//! The three MCP exchanges run over any transport: handshake
//! (`initialize` + `notifications/initialized`), tool discovery
//! (`tools/list`), and tool invocation (`tools/call`).

use crate::channel::RpcChannel;
use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use serde::Deserialize;
use toolmux_types::{ToolDefinition, ToolOutput, ToolOutputContent};

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<&CapabilityDescriptor> for ToolDefinition {
    fn from(d: &CapabilityDescriptor) -> Self {
        ToolDefinition {
            name: d.name.clone(),
            description: d.description.clone(),
            input_schema: d.input_schema.clone(),
        }
    }
}

/// Result of calling a tool on an MCP server.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub content: Vec<ToolOutputContent>,
    pub is_error: bool,
}

impl From<ToolCallResult> for ToolOutput {
    fn from(r: ToolCallResult) -> Self {
        ToolOutput {
            content: r.content,
            is_error: r.is_error,
        }
    }
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct CallResultBody {
    #[serde(default)]
    content: Vec<ToolOutputContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Turn a response into its `result`, or the server's error.
fn into_result(
    channel: &RpcChannel,
    method: &str,
    resp: JsonRpcResponse,
) -> Result<serde_json::Value, McpError> {
    if let Some(err) = resp.error {
        return Err(McpError::JsonRpc {
            server: channel.server().to_string(),
            code: err.code,
            message: err.message,
        });
    }
    resp.result
        .ok_or_else(|| McpError::Protocol(format!("{method} response has neither result nor error")))
}

/// Run the `initialize` handshake.
pub(crate) async fn handshake(channel: &RpcChannel) -> Result<(), McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "toolmux",
            "version": env!("CARGO_PKG_VERSION")
        }
    });

    let resp = channel.request("initialize", Some(params)).await?;
    into_result(channel, "initialize", resp)?;

    channel.notify("notifications/initialized", None).await
}

/// Discover the tools a server exposes.
pub(crate) async fn list_tools(
    channel: &RpcChannel,
) -> Result<Vec<CapabilityDescriptor>, McpError> {
    let resp = channel.request("tools/list", None).await?;
    let result = into_result(channel, "tools/list", resp)?;

    let list: ToolsListResult = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;

    Ok(list
        .tools
        .into_iter()
        .map(|t| CapabilityDescriptor {
            name: t.name,
            description: t.description.unwrap_or_default(),
            input_schema: t.input_schema,
        })
        .collect())
}

/// Invoke one tool.
pub(crate) async fn call_tool(
    channel: &RpcChannel,
    name: &str,
    arguments: serde_json::Value,
) -> Result<ToolCallResult, McpError> {
    let params = serde_json::json!({
        "name": name,
        "arguments": arguments,
    });

    let resp = channel.request("tools/call", Some(params)).await?;
    let result = into_result(channel, "tools/call", resp)?;

    let body: CallResultBody = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

    Ok(ToolCallResult {
        content: body.content,
        is_error: body.is_error,
    })
}
