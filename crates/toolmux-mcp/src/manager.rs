//! MCP manager: brings up the configured servers and aggregates their tools.

use crate::adapter::CapabilityAdapter;
use crate::config::{McpConfig, ServerConfig, TransportKind};
use crate::debug_log::{DebugLog, LogEntry};
use crate::pipe::PipeSession;
use crate::probe;
use crate::session::{Session, SessionState};
use crate::stream::StreamSession;
use std::path::Path;
use std::sync::Arc;
use toolmux_types::{ConfigError, ToolError};

/// Owner name of the manager's own debug log.
const MANAGER_LOG_OWNER: &str = "manager";

/// Manages sessions for multiple MCP servers.
///
/// Bring-up is sequential and never fails as a whole: a server that cannot be
/// validated, found, or initialized is logged and skipped.
pub struct McpManager {
    sessions: Vec<Arc<dyn Session>>,
    log: DebugLog,
    debug: bool,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            log: DebugLog::new(MANAGER_LOG_OWNER),
            debug: true,
        }
    }

    /// Load a server file and bring up every server in it.
    ///
    /// Fails only when the file itself cannot be read or parsed.
    pub async fn initialize_from_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        let config = McpConfig::load(path).inspect_err(|e| self.log.error(e.to_string()))?;
        self.log.info(format!(
            "Loaded {} server(s) from {}",
            config.servers.len(),
            path.display()
        ));
        self.initialize(&config).await;
        Ok(())
    }

    /// Bring up every configured server, in order.
    pub async fn initialize(&mut self, config: &McpConfig) {
        for server in &config.servers {
            let Some(session) = self.build_session(server) else {
                continue;
            };

            session.debug_log().set_enabled(self.debug);
            match session.initialize().await {
                Ok(()) => self.register(session),
                Err(e) => {
                    self.log
                        .error(format!("Failed to initialize server '{}': {e}", server.name));
                }
            }
        }

        if self.sessions.is_empty() && !config.servers.is_empty() {
            self.log.warn("No MCP servers could be initialized");
        } else if !self.sessions.is_empty()
            && self.sessions.iter().all(|s| s.tool_names().is_empty())
        {
            self.log.warn("No MCP tools were loaded");
        }
    }

    fn build_session(&self, server: &ServerConfig) -> Option<Arc<dyn Session>> {
        if let Err(e) = server.validate() {
            self.log
                .error(format!("Skipping server '{}': {e}", server.name));
            return None;
        }

        if server.kind == TransportKind::Pipe && !probe::command_exists(server.command()) {
            self.log.warn(format!(
                "Skipping server '{}': command '{}' not found",
                server.name,
                server.command()
            ));
            return None;
        }

        let config = Arc::new(server.clone());
        let built: Result<Arc<dyn Session>, ConfigError> = match &server.kind {
            TransportKind::Pipe => PipeSession::new(config).map(|s| Arc::new(s) as _),
            TransportKind::Stream => StreamSession::new(config).map(|s| Arc::new(s) as _),
            TransportKind::Unknown(kind) => Err(ConfigError::UnknownKind {
                server: server.name.clone(),
                kind: kind.clone(),
            }),
        };

        built
            .inspect_err(|e| {
                self.log
                    .error(format!("Skipping server '{}': {e}", server.name))
            })
            .ok()
    }

    /// Add a session, replacing any existing one with the same name.
    ///
    /// The session's debug log follows the manager's debug flag. Tool names
    /// already provided by another server are reported here, once.
    pub fn register(&mut self, session: Arc<dyn Session>) {
        session.debug_log().set_enabled(self.debug);
        self.report_tools(session.as_ref());
        match self
            .sessions
            .iter_mut()
            .find(|s| s.name() == session.name())
        {
            Some(slot) => *slot = session,
            None => self.sessions.push(session),
        }
    }

    fn report_tools(&self, session: &dyn Session) {
        let names = session.tool_names();
        self.log.info(format!(
            "Loaded {} tool(s) from '{}'",
            names.len(),
            session.name()
        ));

        let others: Vec<(&str, Vec<String>)> = self
            .sessions
            .iter()
            .filter(|s| s.name() != session.name())
            .map(|s| (s.name(), s.tool_names()))
            .collect();
        for name in &names {
            if let Some((first, _)) = others.iter().find(|(_, tools)| tools.contains(name)) {
                self.log.warn(format!(
                    "Tool '{name}' from '{}' has the same name as a tool from '{first}'",
                    session.name()
                ));
            }
        }
    }

    /// Adapters for every tool of every ready session, in registration order.
    ///
    /// Colliding names are all kept; [`capability`](Self::capability) picks
    /// the first.
    pub fn capabilities(&self) -> Vec<CapabilityAdapter> {
        let mut adapters = Vec::new();
        for session in &self.sessions {
            if session.state() != SessionState::Ready {
                continue;
            }
            let Ok(tools) = session.capabilities() else {
                continue;
            };
            adapters.extend(
                tools
                    .into_iter()
                    .map(|descriptor| CapabilityAdapter::new(session, descriptor)),
            );
        }
        adapters
    }

    /// The first tool named `name`, in registration order.
    pub fn capability(&self, name: &str) -> Result<CapabilityAdapter, ToolError> {
        self.capabilities()
            .into_iter()
            .find(|a| a.descriptor().name == name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    pub fn session(&self, name: &str) -> Option<&Arc<dyn Session>> {
        self.sessions.iter().find(|s| s.name() == name)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.name()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Each registered server with its tool count.
    pub fn server_summary(&self) -> Vec<(&str, usize)> {
        self.sessions
            .iter()
            .map(|s| (s.name(), s.tool_names().len()))
            .collect()
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.debug
    }

    /// Flip debug logging for the manager and every session.
    pub fn toggle_debug(&mut self) -> bool {
        self.set_debug(!self.debug);
        self.debug
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
        self.log.set_enabled(enabled);
        for session in &self.sessions {
            session.debug_log().set_enabled(enabled);
        }
    }

    /// The manager's entries followed by each session's, in registration order.
    pub fn debug_logs(&self) -> Vec<LogEntry> {
        let mut entries = self.log.entries();
        for session in &self.sessions {
            entries.extend(session.debug_log().entries());
        }
        entries
    }

    pub fn clear_debug_logs(&self) {
        self.log.clear();
        for session in &self.sessions {
            session.debug_log().clear();
        }
    }

    /// The manager's own log (bring-up decisions, skipped servers).
    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }
}
