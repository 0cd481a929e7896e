//! toolmux CLI: discover and call tools on MCP servers.

mod runtime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use toolmux_config::{CliOverrides, ToolmuxConfig};
use toolmux_mcp::{McpConfig, McpManager};
use toolmux_types::Tool;

#[derive(Parser)]
#[command(name = "toolmux", version, about = "Discover and call tools on MCP servers")]
struct Cli {
    /// Servers file (overrides TOOLMUX_SERVERS and config.toml)
    #[arg(long, global = true)]
    servers: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Start with the MCP debug log disabled
    #[arg(long, global = true)]
    no_debug: bool,

    /// Print the MCP debug log after the command finishes
    #[arg(long, global = true)]
    show_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check which server runtimes (npx, uvx, python) are installed
    Check,
    /// Start every configured server and list its tools
    Tools,
    /// Call a tool by name
    Call {
        /// Tool name; the first server that provides it is used
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ToolmuxConfig::load(CliOverrides {
        servers_file: cli.servers,
        debug: cli.no_debug.then_some(false),
    });

    match cli.command {
        Command::Check => {
            print_runtimes(&runtime::check_all().await);
            Ok(ExitCode::SUCCESS)
        }
        Command::Tools => {
            warn_missing_runtimes().await;
            let manager = start_servers(&config).await?;
            print_tools(&manager);
            finish(&manager, cli.show_log, ExitCode::SUCCESS)
        }
        Command::Call { tool, args } => {
            let input: serde_json::Value =
                serde_json::from_str(&args).context("--args is not valid JSON")?;
            let manager = start_servers(&config).await?;
            let code = call_tool(&manager, &tool, input).await;
            finish(&manager, cli.show_log, code)
        }
    }
}

fn load_servers(config: &ToolmuxConfig) -> Result<McpConfig> {
    config.load_servers().with_context(|| {
        format!(
            "Failed to load MCP servers from {}",
            config.servers_file.display()
        )
    })
}

async fn start_servers(config: &ToolmuxConfig) -> Result<McpManager> {
    let servers = load_servers(config)?;

    let mut manager = McpManager::new();
    manager.set_debug(config.debug);
    manager.initialize(&servers).await;

    if manager.session_count() == 0 {
        eprintln!(
            "Warning: none of the {} configured MCP server(s) started",
            servers.servers.len()
        );
    }
    Ok(manager)
}

async fn warn_missing_runtimes() {
    for status in runtime::check_all().await {
        if !status.available() {
            eprintln!(
                "Warning: {} is not available ({}); servers launched with it will be skipped",
                status.runtime, status.detail
            );
        }
    }
}

async fn call_tool(manager: &McpManager, name: &str, input: serde_json::Value) -> ExitCode {
    let result = match manager.capability(name) {
        Ok(tool) => tool.execute(input).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            println!("{}", output.text_content());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_input_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn finish(manager: &McpManager, show_log: bool, code: ExitCode) -> Result<ExitCode> {
    if show_log {
        eprintln!("--- debug log ---");
        for entry in manager.debug_logs() {
            eprintln!("{entry}");
        }
    }
    Ok(code)
}

fn print_runtimes(statuses: &[runtime::RuntimeStatus]) {
    for status in statuses {
        let mark = if status.available() { "ok" } else { "missing" };
        println!("{:<8} {:<8} {}", status.runtime, mark, status.detail);
    }
}

fn print_tools(manager: &McpManager) {
    let adapters = manager.capabilities();
    if adapters.is_empty() {
        println!("No tools available.");
        return;
    }

    let server_width = adapters.iter().map(|a| a.server().len()).max().unwrap_or(0);
    let name_width = adapters.iter().map(|a| a.name().len()).max().unwrap_or(0);
    for adapter in &adapters {
        let description = adapter.description().lines().next().unwrap_or_default();
        println!(
            "{:<server_width$}  {:<name_width$}  {description}",
            adapter.server(),
            adapter.name(),
        );
    }
}
