//! The per-server session contract and the state shared by its
//! implementations.

use crate::channel::RpcChannel;
use crate::config::{ServerConfig, TransportKind};
use crate::debug_log::DebugLog;
use crate::error::McpError;
use crate::protocol::{self, CapabilityDescriptor, ToolCallResult};
use crate::transport::{self, Connection};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use toolmux_types::BoxFuture;

/// Lifecycle of a session.
///
/// `Uninitialized → Initializing → Ready | Failed`. A later `initialize()`
/// starts a new `Initializing` attempt from either end state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        })
    }
}

/// One configured MCP server, reachable over some transport.
///
/// Dyn-compatible so the manager can hold `Arc<dyn Session>`.
pub trait Session: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> TransportKind;

    fn state(&self) -> SessionState;

    fn debug_log(&self) -> &DebugLog;

    /// Connect, handshake and discover tools within the server's deadline.
    ///
    /// Calling it again repeats everything and replaces the tool list.
    fn initialize(&self) -> BoxFuture<'_, Result<(), McpError>>;

    /// Tools discovered by the last successful `initialize()`.
    fn capabilities(&self) -> Result<Vec<CapabilityDescriptor>, McpError>;

    /// Call one tool over a fresh connection.
    fn invoke<'a>(
        &'a self,
        name: &'a str,
        args: serde_json::Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, McpError>>;

    fn tool_names(&self) -> Vec<String> {
        self.capabilities()
            .map(|tools| tools.into_iter().map(|t| t.name).collect())
            .unwrap_or_default()
    }

    fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.capabilities()
            .map(|tools| {
                tools
                    .into_iter()
                    .map(|t| (t.name, t.description))
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct Status {
    state: SessionState,
    capabilities: Option<Vec<CapabilityDescriptor>>,
}

/// State and exchange logic common to both session kinds. The kinds differ
/// only in how a connection is opened.
pub(crate) struct SessionCore {
    config: Arc<ServerConfig>,
    log: DebugLog,
    status: Mutex<Status>,
}

impl SessionCore {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let log = DebugLog::new(config.name.clone());
        Self {
            config,
            log,
            status: Mutex::new(Status {
                state: SessionState::Uninitialized,
                capabilities: None,
            }),
        }
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    pub fn state(&self) -> SessionState {
        self.status().state
    }

    pub fn capabilities(&self) -> Result<Vec<CapabilityDescriptor>, McpError> {
        let status = self.status();
        match (&status.state, &status.capabilities) {
            (SessionState::Ready, Some(tools)) => Ok(tools.clone()),
            _ => Err(self.not_initialized()),
        }
    }

    fn not_initialized(&self) -> McpError {
        McpError::NotInitialized {
            server: self.config.name.clone(),
        }
    }

    /// Run handshake + discovery over a connection from `open`.
    pub async fn initialize<F>(&self, open: F) -> Result<(), McpError>
    where
        F: FnOnce() -> Result<(Connection, RpcChannel), McpError>,
    {
        self.status().state = SessionState::Initializing;
        self.log.info(format!(
            "Initializing {} server (timeout {}ms)",
            self.config.kind,
            self.config.timeout().as_millis()
        ));

        let discovered = match open() {
            Ok((conn, rpc)) => {
                transport::run_scoped(
                    conn,
                    rpc,
                    self.config.timeout(),
                    "initialize",
                    |rpc| async move {
                        protocol::handshake(&rpc).await?;
                        protocol::list_tools(&rpc).await
                    },
                )
                .await
            }
            Err(e) => Err(e),
        };

        match discovered {
            Ok(tools) => {
                self.log.info(format!(
                    "Initialized with {} tool(s): {}",
                    tools.len(),
                    tools
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                let mut status = self.status();
                status.state = SessionState::Ready;
                status.capabilities = Some(tools);
                Ok(())
            }
            Err(e) => {
                let e = e.into_connection(&self.config.name);
                self.log.error(format!("Initialization failed: {e}"));
                let mut status = self.status();
                status.state = SessionState::Failed;
                status.capabilities = None;
                Err(e)
            }
        }
    }

    /// Handshake and make one `tools/call` over a connection from `open`.
    pub async fn invoke<F>(
        &self,
        open: F,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolCallResult, McpError>
    where
        F: FnOnce() -> Result<(Connection, RpcChannel), McpError>,
    {
        if self.state() != SessionState::Ready {
            let e = self.not_initialized();
            self.log.error(format!("Cannot call '{name}': {e}"));
            return Err(e);
        }

        self.log.debug(format!("Calling tool '{name}'"));

        let result = match open() {
            Ok((conn, rpc)) => {
                transport::run_scoped(
                    conn,
                    rpc,
                    self.config.call_timeout(),
                    "tools/call",
                    |rpc| async move {
                        protocol::handshake(&rpc).await?;
                        protocol::call_tool(&rpc, name, args).await
                    },
                )
                .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(r) if r.is_error => self.log.warn(format!("Tool '{name}' returned an error")),
            Ok(_) => self.log.debug(format!("Tool '{name}' completed")),
            Err(e) => self.log.error(format!("Tool '{name}' failed: {e}")),
        }
        result
    }
}
