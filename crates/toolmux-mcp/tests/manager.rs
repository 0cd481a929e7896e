//! McpManager bring-up against the mock server binary.

use serde_json::json;
use std::sync::Arc;
use toolmux_mcp::{LogLevel, McpConfig, McpManager, PipeSession, ServerConfig, Session};
use toolmux_types::{Tool, ToolError};

const MOCK: &str = env!("CARGO_BIN_EXE_mock-mcp-server");

fn mock(name: &str) -> ServerConfig {
    ServerConfig::pipe(name, MOCK).with_timeouts(5_000, 5_000)
}

fn mock_with_tools(name: &str, dir: &std::path::Path, tools: &str) -> ServerConfig {
    let path = dir.join(format!("{name}.tools"));
    std::fs::write(&path, tools).unwrap();
    mock(name).with_args(["--tools-file".to_string(), path.display().to_string()])
}

#[tokio::test]
async fn partial_failure_skips_only_the_broken_server() {
    let dir = tempfile::tempdir().unwrap();
    let config = McpConfig {
        servers: vec![
            mock("alpha"),
            ServerConfig::pipe("weather", "doesnotexist123"),
            mock_with_tools("beta", dir.path(), "lookup\n"),
        ],
    };

    let mut manager = McpManager::new();
    manager.initialize(&config).await;

    assert_eq!(manager.server_names(), ["alpha", "beta"]);
    assert!(manager.session("weather").is_none());

    let tools: Vec<_> = manager
        .capabilities()
        .into_iter()
        .map(|a| (a.server().to_string(), a.name().to_string()))
        .collect();
    assert_eq!(tools.len(), 4);
    assert!(tools.iter().all(|(server, _)| server != "weather"));
    assert_eq!(tools[3], ("beta".to_string(), "lookup".to_string()));

    let skipped = manager
        .debug_logs()
        .into_iter()
        .find(|e| e.level == LogLevel::Warning && e.message.contains("'weather'"));
    assert!(skipped.is_some(), "no warning names the skipped server");
}

#[tokio::test]
async fn server_summary_and_order_follow_the_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = McpConfig {
        servers: vec![
            mock_with_tools("one", dir.path(), "a\nb\n"),
            mock_with_tools("two", dir.path(), "c\n"),
        ],
    };
    let mut manager = McpManager::new();
    manager.initialize(&config).await;

    assert_eq!(manager.server_summary(), [("one", 2), ("two", 1)]);
    assert_eq!(manager.session_count(), 2);
}

#[tokio::test]
async fn colliding_tool_names_are_kept_and_reported() {
    let config = McpConfig {
        servers: vec![mock("first"), mock("second")],
    };
    let mut manager = McpManager::new();
    manager.initialize(&config).await;

    let collisions = |manager: &McpManager| {
        manager
            .debug_log()
            .entries()
            .into_iter()
            .filter(|e| e.level == LogLevel::Warning && e.message.contains("same name"))
            .count()
    };
    // One warning per shared name, raised when "second" registered.
    assert_eq!(collisions(&manager), 3);

    let adapters = manager.capabilities();
    assert_eq!(adapters.len(), 6);
    let echo = manager.capability("echo").unwrap();
    assert_eq!(echo.server(), "first");
    manager.capability("fail").unwrap();

    // Lookups do not report them again.
    assert_eq!(collisions(&manager), 3);
    let warning = manager
        .debug_log()
        .entries()
        .into_iter()
        .find(|e| e.message.contains("Tool 'echo'"))
        .unwrap();
    assert_eq!(
        warning.message,
        "Tool 'echo' from 'second' has the same name as a tool from 'first'"
    );
}

#[tokio::test]
async fn adapters_validate_and_invoke() {
    let config = McpConfig {
        servers: vec![mock("mock")],
    };
    let mut manager = McpManager::new();
    manager.initialize(&config).await;

    let echo = manager.capability("echo").unwrap();
    let output = echo.execute(json!({"text": "hi"})).await.unwrap();
    assert_eq!(output.text_content(), "hi");

    let err = echo.execute(json!({"text": 1})).await.unwrap_err();
    assert!(err.is_input_error());
    assert!(err.to_string().contains("input.text"));

    let fail = manager.capability("fail").unwrap();
    match fail.execute(json!({})).await {
        Err(ToolError::Remote { tool, .. }) => assert_eq!(tool, "fail"),
        other => panic!("Expected Remote, got {other:?}"),
    }

    assert!(matches!(
        manager.capability("missing"),
        Err(ToolError::UnknownTool { .. })
    ));
}

#[tokio::test]
async fn adapters_outliving_the_manager_report_closed() {
    let config = McpConfig {
        servers: vec![mock("mock")],
    };
    let mut manager = McpManager::new();
    manager.initialize(&config).await;
    let echo = manager.capability("echo").unwrap();
    drop(manager);

    assert!(matches!(
        echo.execute(json!({"text": "hi"})).await,
        Err(ToolError::SessionClosed { .. })
    ));
}

#[tokio::test]
async fn debug_toggle_reaches_every_session() {
    let config = McpConfig {
        servers: vec![mock("mock")],
    };
    let mut manager = McpManager::new();
    manager.initialize(&config).await;
    let before = manager.debug_logs().len();
    assert!(before > 0);

    assert!(!manager.toggle_debug());
    let echo = manager.capability("echo").unwrap();
    echo.execute(json!({"text": "quiet"})).await.unwrap();
    let _ = echo.execute(json!({})).await;
    assert_eq!(manager.debug_logs().len(), before);

    assert!(manager.toggle_debug());
    assert!(manager.is_debug_enabled());
    let markers = manager
        .debug_logs()
        .into_iter()
        .filter(|e| e.message == "Debug mode enabled")
        .count();
    assert_eq!(markers, 2);

    manager.clear_debug_logs();
    assert!(manager.debug_logs().is_empty());
}

#[tokio::test]
async fn sessions_registered_later_follow_the_debug_flag() {
    let mut manager = McpManager::new();
    manager.set_debug(false);

    let session: Arc<dyn Session> = Arc::new(PipeSession::new(Arc::new(mock("late"))).unwrap());
    session.initialize().await.unwrap();
    manager.register(Arc::clone(&session));

    assert!(!session.debug_log().is_enabled());
    assert_eq!(manager.server_names(), ["late"]);
}

#[tokio::test]
async fn register_replaces_a_session_with_the_same_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = McpManager::new();

    let first = PipeSession::new(Arc::new(mock_with_tools("svc", dir.path(), "old\n"))).unwrap();
    first.initialize().await.unwrap();
    manager.register(Arc::new(first));

    let second = PipeSession::new(Arc::new(mock_with_tools("svc", dir.path(), "new\n"))).unwrap();
    second.initialize().await.unwrap();
    manager.register(Arc::new(second));

    assert_eq!(manager.session_count(), 1);
    assert_eq!(manager.session("svc").unwrap().tool_names(), ["new"]);
}

#[tokio::test]
async fn initialize_from_path_reads_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.json");
    let file = json!({
        "mcpServers": {
            "mock": {"type": "stdio", "command": MOCK},
            "weather": {"type": "stdio", "command": "doesnotexist123"}
        }
    });
    std::fs::write(&path, file.to_string()).unwrap();

    let mut manager = McpManager::new();
    manager.initialize_from_path(&path).await.unwrap();
    assert_eq!(manager.server_names(), ["mock"]);
}

#[tokio::test]
async fn unreadable_config_file_is_the_only_manager_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = McpManager::new();
    let err = manager
        .initialize_from_path(&dir.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, toolmux_types::ConfigError::Read { .. }));
    assert_eq!(manager.session_count(), 0);
}

/// The filesystem + weather scenario with the real filesystem server.
#[tokio::test]
#[ignore = "needs npx and network access to fetch @modelcontextprotocol/server-filesystem"]
async fn filesystem_and_missing_weather_server() {
    if !toolmux_mcp::probe::command_exists("npx") {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = McpConfig {
        servers: vec![
            ServerConfig::pipe("filesystem", "npx")
                .with_args([
                    "-y".to_string(),
                    "@modelcontextprotocol/server-filesystem".to_string(),
                    dir.path().display().to_string(),
                ])
                .with_timeouts(120_000, 60_000),
            ServerConfig::pipe("weather", "doesnotexist123"),
        ],
    };

    let mut manager = McpManager::new();
    manager.initialize(&config).await;

    let adapters = manager.capabilities();
    assert!(!adapters.is_empty());
    assert!(adapters.iter().all(|a| a.server() == "filesystem"));
    assert!(
        manager
            .debug_logs()
            .iter()
            .any(|e| e.message.contains("Skipping server 'weather'"))
    );
}
