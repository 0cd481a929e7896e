//! Configuration types for MCP servers.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use toolmux_types::ConfigError;

/// Default deadline for connect + handshake + discovery.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default deadline for one invocation (fresh connect + handshake + call).
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 60_000;

/// Which wire transport a server is reached through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    /// A spawned child process speaking over stdin/stdout.
    Pipe,
    /// An HTTP server-sent-events stream with a POST back-channel.
    Stream,
    /// Anything else found in the config file, kept so the error can be
    /// attributed to the one server that declared it.
    Unknown(String),
}

impl From<String> for TransportKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "stdio" | "pipe" => Self::Pipe,
            "sse" | "stream" => Self::Stream,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Pipe => "stdio".to_string(),
            TransportKind::Stream => "sse".to_string(),
            TransportKind::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipe => f.write_str("stdio"),
            Self::Stream => f.write_str("sse"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

fn missing_kind() -> TransportKind {
    TransportKind::Unknown(String::new())
}

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name; taken from the key of the `mcpServers` table.
    #[serde(skip)]
    pub name: String,
    /// A missing discriminator is kept as an empty unknown kind so the
    /// server fails validation on its own.
    #[serde(rename = "type", alias = "kind", default = "missing_kind")]
    pub kind: TransportKind,
    /// Command to run (e.g., "npx", "uvx"). Required for stdio servers.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Merged over the inherited environment of this process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Event-stream endpoint. Required for sse servers.
    #[serde(default)]
    pub url: Option<String>,
    /// Attached to every HTTP request (e.g., for authentication).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Deadline for connect + handshake + discovery, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Deadline for one tool invocation, in milliseconds.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl ServerConfig {
    fn new(name: impl Into<String>, kind: TransportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            timeout_ms: None,
            call_timeout_ms: None,
        }
    }

    /// A stdio server launched with `command`.
    pub fn pipe(name: impl Into<String>, command: impl Into<String>) -> Self {
        let mut config = Self::new(name, TransportKind::Pipe);
        config.command = Some(command.into());
        config
    }

    /// An sse server reached at `url`.
    pub fn stream(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut config = Self::new(name, TransportKind::Stream);
        config.url = Some(url.into());
        config
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeouts(mut self, timeout_ms: u64, call_timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self.call_timeout_ms = Some(call_timeout_ms);
        self
    }

    /// Check the transport-specific invariants.
    ///
    /// stdio servers need a non-empty `command`, sse servers a non-empty `url`.
    /// Must be re-run after any mutation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.kind {
            TransportKind::Pipe => self.require("command", self.command.as_deref()),
            TransportKind::Stream => self.require("url", self.url.as_deref()),
            TransportKind::Unknown(kind) => Err(ConfigError::UnknownKind {
                server: self.name.clone(),
                kind: kind.clone(),
            }),
        }
    }

    fn require(&self, field: &'static str, value: Option<&str>) -> Result<(), ConfigError> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingField {
                server: self.name.clone(),
                field,
            }),
        }
    }

    /// The command of a validated stdio server (empty otherwise).
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or_default()
    }

    /// The url of a validated sse server (empty otherwise).
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.unwrap_or(DEFAULT_CALL_TIMEOUT_MS))
    }
}

/// The ordered set of configured servers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpConfig {
    #[serde(
        default,
        rename = "mcpServers",
        alias = "servers",
        deserialize_with = "ordered_servers"
    )]
    pub servers: Vec<ServerConfig>,
}

impl McpConfig {
    /// Load a server file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Fill in deadlines for servers that do not set their own.
    pub fn apply_default_timeouts(&mut self, timeout_ms: u64, call_timeout_ms: u64) {
        for server in &mut self.servers {
            server.timeout_ms.get_or_insert(timeout_ms);
            server.call_timeout_ms.get_or_insert(call_timeout_ms);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Deserialize the `mcpServers` table into a list that keeps file order and
/// carries each key as the server name.
fn ordered_servers<'de, D>(deserializer: D) -> Result<Vec<ServerConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ServersVisitor;

    impl<'de> Visitor<'de> for ServersVisitor {
        type Value = Vec<ServerConfig>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of server name to server configuration")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut servers: Vec<ServerConfig> = Vec::new();
            while let Some((name, mut server)) = map.next_entry::<String, ServerConfig>()? {
                server.name = name;
                servers.retain(|s| s.name != server.name);
                servers.push(server);
            }
            Ok(servers)
        }
    }

    deserializer.deserialize_map(ServersVisitor)
}
