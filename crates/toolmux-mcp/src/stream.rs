//! Session over an HTTP event stream.

use crate::channel::RpcChannel;
use crate::config::{ServerConfig, TransportKind};
use crate::debug_log::DebugLog;
use crate::error::McpError;
use crate::protocol::{CapabilityDescriptor, ToolCallResult};
use crate::session::{Session, SessionCore, SessionState};
use crate::transport::{Connection, StreamConnection};
use std::sync::Arc;
use toolmux_types::{BoxFuture, ConfigError};

/// A server reached over SSE, with a new connection per exchange.
pub struct StreamSession {
    core: SessionCore,
    http: reqwest::Client,
}

impl StreamSession {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, ConfigError> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Use a caller-supplied HTTP client (proxies, TLS settings).
    pub fn with_client(
        config: Arc<ServerConfig>,
        http: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.kind != TransportKind::Stream {
            return Err(ConfigError::KindMismatch {
                server: config.name.clone(),
                expected: "sse",
                found: config.kind.to_string(),
            });
        }
        Ok(Self {
            core: SessionCore::new(config),
            http,
        })
    }

    fn open(&self) -> Result<(Connection, RpcChannel), McpError> {
        let config = self.core.config();
        self.core
            .log()
            .debug(format!("Opening event stream: {}", config.url()));
        let (conn, rpc) = StreamConnection::open(config, &self.http)?;
        Ok((Connection::Stream(conn), rpc))
    }
}

impl Session for StreamSession {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pipe_config() {
        let config = Arc::new(ServerConfig::pipe("fs", "npx"));
        assert!(matches!(
            StreamSession::new(config),
            Err(ConfigError::KindMismatch { expected: "sse", .. })
        ));
    }

    #[test]
    fn rejects_missing_url() {
        let config = Arc::new(ServerConfig::stream("remote", ""));
        assert!(matches!(
            StreamSession::new(config),
            Err(ConfigError::MissingField { field: "url", .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_fails_initialize() {
        let config = Arc::new(
            ServerConfig::stream("remote", "http://127.0.0.1:9/sse").with_timeouts(2_000, 2_000),
        );
        let session = StreamSession::new(config).unwrap();
        let err = session.initialize().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(session.state(), SessionState::Failed);
    }
}
