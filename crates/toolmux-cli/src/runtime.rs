//! Availability checks for the runtimes MCP servers are usually launched with.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// How long a `--version` probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of probing one runtime.
#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub runtime: &'static str,
    /// The command that answered, if any.
    pub command: Option<String>,
    pub version: Option<String>,
    pub detail: String,
}

impl RuntimeStatus {
    pub fn available(&self) -> bool {
        self.command.is_some()
    }
}

/// Probe every runtime, in a fixed order.
pub async fn check_all() -> Vec<RuntimeStatus> {
    vec![check_npx().await, check_uvx().await, check_python().await]
}

pub async fn check_npx() -> RuntimeStatus {
    let cmd = if cfg!(windows) { "npx.cmd" } else { "npx" };
    probe("npx", &[cmd]).await
}

pub async fn check_uvx() -> RuntimeStatus {
    probe("uvx", &["uvx"]).await
}

/// Either `python` or `python3` will do.
pub async fn check_python() -> RuntimeStatus {
    probe("python", &["python", "python3"]).await
}

async fn probe(runtime: &'static str, candidates: &[&str]) -> RuntimeStatus {
    let mut failures = Vec::new();

    for cmd in candidates {
        match version_of(cmd).await {
            Ok(version) => {
                tracing::debug!(runtime, cmd, %version, "runtime available");
                return RuntimeStatus {
                    runtime,
                    command: Some(cmd.to_string()),
                    detail: format!("{cmd} {version}"),
                    version: Some(version),
                };
            }
            Err(reason) => {
                tracing::debug!(runtime, cmd, "{reason}");
                failures.push(reason);
            }
        }
    }

    RuntimeStatus {
        runtime,
        command: None,
        version: None,
        detail: failures.join("; "),
    }
}

/// Run `cmd --version` and return the first line it printed.
async fn version_of(cmd: &str) -> Result<String, String> {
    let output = Command::new(cmd)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(format!("{cmd} not found in PATH"));
        }
        Ok(Err(e)) => return Err(format!("failed to run {cmd}: {e}")),
        Err(_) => return Err(format!("{cmd} --version did not finish")),
    };

    // Some tools print their version on stderr.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stdout.trim().is_empty() { stderr } else { stdout };
    let first_line = text.lines().next().unwrap_or_default().trim().to_string();

    if output.status.success() {
        Ok(first_line)
    } else {
        Err(format!("{cmd} --version failed ({}): {first_line}", output.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_runtime_is_unavailable() {
        let status = probe("ghost", &["doesnotexist123", "doesnotexist456"]).await;
        assert!(!status.available());
        assert!(status.detail.contains("doesnotexist123 not found"));
        assert!(status.detail.contains("doesnotexist456 not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn falls_through_to_the_next_candidate() {
        // `sh --version` is not portable, but `true` always succeeds.
        let status = probe("shell", &["doesnotexist123", "true"]).await;
        assert!(status.available());
        assert_eq!(status.command.as_deref(), Some("true"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_unavailable() {
        let status = probe("failing", &["false"]).await;
        assert!(!status.available());
        assert!(status.detail.contains("failed"));
    }
}
