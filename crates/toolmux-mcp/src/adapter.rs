//! Wraps a discovered MCP tool as a `toolmux_types::Tool`.

use crate::error::McpError;
use crate::protocol::CapabilityDescriptor;
use crate::schema;
use crate::session::Session;
use std::sync::{Arc, Weak};
use toolmux_types::{BoxFuture, Tool, ToolDefinition, ToolError, ToolOutput};

/// One remote tool, bound weakly to the session that discovered it.
///
/// Arguments are checked against the tool's input schema before any
/// transport work. If the session has been dropped the call fails with
/// `ToolError::SessionClosed`.
#[derive(Clone)]
pub struct CapabilityAdapter {
    server: String,
    descriptor: CapabilityDescriptor,
    session: Weak<dyn Session>,
}

impl CapabilityAdapter {
    pub fn new(session: &Arc<dyn Session>, descriptor: CapabilityDescriptor) -> Self {
        Self {
            server: session.name().to_string(),
            descriptor,
            session: Arc::downgrade(session),
        }
    }

    /// Name of the server that provides this tool.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn input_schema(&self) -> &serde_json::Value {
        &self.descriptor.input_schema
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Validate `args` and call the tool on its server.
    pub async fn invoke(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let tool = self.descriptor.name.as_str();
        let session = self.session.upgrade();

        let result = self.invoke_inner(session.as_deref(), args).await;
        if let Err(e) = &result {
            match &session {
                Some(session) => session.debug_log().error(e.to_string()),
                None => tracing::warn!(server = %self.server, tool, "{e}"),
            }
        }
        result
    }

    async fn invoke_inner(
        &self,
        session: Option<&dyn Session>,
        args: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = &self.descriptor.name;

        schema::validate(&self.descriptor.input_schema, &args).map_err(|v| {
            ToolError::Schema {
                tool: tool.clone(),
                message: v.to_string(),
            }
        })?;

        let session = session.ok_or_else(|| ToolError::SessionClosed {
            server: self.server.clone(),
            tool: tool.clone(),
        })?;

        let result = session
            .invoke(tool, args)
            .await
            .map_err(|e| self.tool_error(e))?;

        if result.is_error {
            return Err(ToolError::Remote {
                tool: tool.clone(),
                content: result.content,
            });
        }
        Ok(result.into())
    }

    fn tool_error(&self, e: McpError) -> ToolError {
        match e {
            McpError::Timeout { timeout_ms, .. } => ToolError::Timeout {
                tool: self.descriptor.name.clone(),
                timeout_ms,
            },
            McpError::NotInitialized { server } => ToolError::NotInitialized { server },
            other => ToolError::ExecutionFailed(format!(
                "{}/{}: {other}",
                self.server, self.descriptor.name
            )),
        }
    }
}

impl Tool for CapabilityAdapter {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn definition(&self) -> ToolDefinition {
        (&self.descriptor).into()
    }

    fn execute(
        &self,
        input: serde_json::Value,
    ) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(self.invoke(input))
    }
}
