//! Session over a spawned subprocess.

use crate::channel::RpcChannel;
use crate::config::{ServerConfig, TransportKind};
use crate::debug_log::DebugLog;
use crate::error::McpError;
use crate::protocol::{CapabilityDescriptor, ToolCallResult};
use crate::session::{Session, SessionCore, SessionState};
use crate::transport::{Connection, PipeConnection};
use std::sync::Arc;
use toolmux_types::{BoxFuture, ConfigError};

/// A server launched as a child process per exchange.
///
/// Every `initialize()` and `invoke()` spawns its own process, which is killed
/// and reaped before the call returns.
pub struct PipeSession {
    core: SessionCore,
}

impl PipeSession {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.kind != TransportKind::Pipe {
            return Err(ConfigError::KindMismatch {
                server: config.name.clone(),
                expected: "stdio",
                found: config.kind.to_string(),
            });
        }
        Ok(Self {
            core: SessionCore::new(config),
        })
    }

    fn open(&self) -> Result<(Connection, RpcChannel), McpError> {
        let config = self.core.config();
        self.core.log().debug(format!(
            "Spawning: {} {}",
            config.command(),
            config.args.join(" ")
        ));
        let (conn, rpc) = PipeConnection::spawn(config)?;
        Ok((Connection::Pipe(conn), rpc))
    }
}

impl Session for PipeSession {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Pipe
    }

    fn state(&self) -> SessionState {
        self.core.state()
    }

    fn debug_log(&self) -> &DebugLog {
        self.core.log()
    }

    fn initialize(&self) -> BoxFuture<'_, Result<(), McpError>> {
        Box::pin(self.core.initialize(|| self.open()))
    }

    fn capabilities(&self) -> Result<Vec<CapabilityDescriptor>, McpError> {
        self.core.capabilities()
    }

    fn invoke<'a>(
        &'a self,
        name: &'a str,
        args: serde_json::Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, McpError>> {
        Box::pin(self.core.invoke(|| self.open(), name, args))
    }
}
