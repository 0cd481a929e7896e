//! Layered configuration for toolmux.
//!
//! Reads settings from multiple sources with precedence:
//! CLI flags > env vars > `config.toml` > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toolmux_mcp::McpConfig;
use toolmux_mcp::config::{DEFAULT_CALL_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};
use toolmux_types::ConfigError;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "TOOLMUX_CONFIG_DIR";

/// Environment variable naming the servers file.
pub const SERVERS_FILE_ENV: &str = "TOOLMUX_SERVERS";

/// Servers file looked up in the config directory when nothing else names one.
pub const DEFAULT_SERVERS_FILE: &str = "mcp_servers.json";

/// Resolved configuration for one toolmux run.
#[derive(Debug, Clone)]
pub struct ToolmuxConfig {
    pub config_dir: PathBuf,
    pub servers_file: PathBuf,
    pub timeout_ms: u64,
    pub call_timeout_ms: u64,
    /// Whether debug logs start enabled.
    pub debug: bool,
}

/// Settings that can be read from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub mcp: McpSettings,
}

/// The `[mcp]` section of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpSettings {
    /// Relative paths are taken from the config directory.
    pub servers_file: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub call_timeout_ms: Option<u64>,
    pub debug: Option<bool>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub servers_file: Option<PathBuf>,
    pub debug: Option<bool>,
}

impl ToolmuxConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Never fails: a missing or malformed settings file means defaults.
    pub fn load(overrides: CliOverrides) -> Self {
        let env_servers = std::env::var_os(SERVERS_FILE_ENV).map(PathBuf::from);
        Self::resolve(config_dir(), overrides, env_servers)
    }

    /// Resolve against an explicit config directory and `TOOLMUX_SERVERS` value.
    pub fn resolve(
        config_dir: PathBuf,
        overrides: CliOverrides,
        env_servers: Option<PathBuf>,
    ) -> Self {
        let settings = load_settings_file(&config_dir.join("config.toml")).mcp;

        // Servers file: CLI > env > settings > default
        let servers_file = overrides
            .servers_file
            .or(env_servers)
            .or_else(|| settings.servers_file.map(|p| config_dir.join(p)))
            .unwrap_or_else(|| config_dir.join(DEFAULT_SERVERS_FILE));

        let debug = overrides.debug.or(settings.debug).unwrap_or(true);

        ToolmuxConfig {
            servers_file,
            timeout_ms: settings.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            call_timeout_ms: settings.call_timeout_ms.unwrap_or(DEFAULT_CALL_TIMEOUT_MS),
            debug,
            config_dir,
        }
    }

    /// Read the servers file, filling in the configured default deadlines.
    pub fn load_servers(&self) -> Result<McpConfig, ConfigError> {
        let mut servers = McpConfig::load(&self.servers_file)?;
        servers.apply_default_timeouts(self.timeout_ms, self.call_timeout_ms);
        Ok(servers)
    }
}

/// Get the toolmux config directory path (~/.toolmux/).
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolmux")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(dir: &Path, content: &str) {
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn defaults_without_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        assert_eq!(config.servers_file, dir.path().join("mcp_servers.json"));
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.call_timeout_ms, DEFAULT_CALL_TIMEOUT_MS);
        assert!(config.debug);
    }

    #[test]
    fn settings_file_values() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(
            dir.path(),
            r#"
[mcp]
servers_file = "servers.toml"
timeout_ms = 10000
call_timeout_ms = 20000
debug = false
"#,
        );
        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        assert_eq!(config.servers_file, dir.path().join("servers.toml"));
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.call_timeout_ms, 20_000);
        assert!(!config.debug);
    }

    #[test]
    fn servers_file_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "[mcp]\nservers_file = \"from-settings.json\"\n");

        let from_env = Some(PathBuf::from("/env/servers.json"));
        let config =
            ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), from_env.clone());
        assert_eq!(config.servers_file, PathBuf::from("/env/servers.json"));

        let overrides = CliOverrides {
            servers_file: Some(PathBuf::from("/cli/servers.json")),
            debug: Some(false),
        };
        let config = ToolmuxConfig::resolve(dir.path().into(), overrides, from_env);
        assert_eq!(config.servers_file, PathBuf::from("/cli/servers.json"));
        assert!(!config.debug);
    }

    #[test]
    fn absolute_servers_file_in_settings_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "[mcp]\nservers_file = \"/etc/toolmux/servers.json\"\n");
        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        assert_eq!(config.servers_file, PathBuf::from("/etc/toolmux/servers.json"));
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "[mcp\ntimeout_ms = ");
        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn load_servers_applies_default_deadlines() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "[mcp]\ntimeout_ms = 1234\n");
        std::fs::write(
            dir.path().join("mcp_servers.json"),
            r#"{"mcpServers": {
                "fs": {"type": "stdio", "command": "npx"},
                "remote": {"type": "sse", "url": "http://localhost/sse", "timeout_ms": 99}
            }}"#,
        )
        .unwrap();

        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        let servers = config.load_servers().unwrap();
        assert_eq!(servers.get("fs").unwrap().timeout_ms, Some(1234));
        assert_eq!(
            servers.get("fs").unwrap().call_timeout_ms,
            Some(DEFAULT_CALL_TIMEOUT_MS)
        );
        assert_eq!(servers.get("remote").unwrap().timeout_ms, Some(99));
    }

    #[test]
    fn missing_servers_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolmuxConfig::resolve(dir.path().into(), CliOverrides::default(), None);
        assert!(matches!(
            config.load_servers(),
            Err(ConfigError::Read { .. })
        ));
    }
}
