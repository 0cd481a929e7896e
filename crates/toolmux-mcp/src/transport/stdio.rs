//! Subprocess transport: newline-delimited JSON-RPC over the child's
//! stdin/stdout.

use crate::channel::RpcChannel;
use crate::config::ServerConfig;
use crate::error::McpError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long a child gets to exit on its own after stdin closes.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A running server process and the tasks pumping its pipes.
///
/// On unix the child leads its own process group, so launchers such as `npx`
/// take their descendants down with them.
pub(crate) struct PipeConnection {
    child: Child,
    /// Process group to kill on close. Cleared once it has been signalled.
    group: Option<u32>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl PipeConnection {
    /// Spawn the configured command and start the reader/writer tasks.
    pub fn spawn(config: &ServerConfig) -> Result<(Self, RpcChannel), McpError> {
        let mut cmd = Command::new(config.command());
        cmd.args(&config.args)
            .envs(&config.env)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: config.name.clone(),
            source: e,
        })?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::Protocol(format!(
                "Server '{}' was spawned without stdio pipes",
                config.name
            )));
        };

        tracing::debug!(server = %config.name, pid = ?child.id(), "spawned MCP server");

        let (channel, mut outbound) = RpcChannel::new(&config.name);

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                if stdin.write_all(msg.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let inbound = channel.clone();
        let server = config.name.clone();
        let reader = tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let mut line = Vec::new();
            loop {
                line.clear();
                match stdout.read_until(b'\n', &mut line).await {
                    Ok(0) => {
                        inbound.close("server closed its output").await;
                        break;
                    }
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        if let std::borrow::Cow::Owned(_) = text {
                            tracing::warn!(server = %server, "server output is not valid UTF-8");
                        }
                        inbound.dispatch_message(&text).await;
                    }
                    Err(e) => {
                        inbound.close(format!("failed to read server output: {e}")).await;
                        break;
                    }
                }
            }
        });

        let group = child.id();
        Ok((
            Self {
                child,
                group,
                reader,
                writer,
            },
            channel,
        ))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Stop the process group and wait until the child has been reaped.
    ///
    /// With a `grace` period the child first gets up to that long (capped at
    /// [`EXIT_GRACE`]) to exit after stdin closes. Without one, or once it runs
    /// out, the child is killed.
    pub async fn close(mut self, grace: Option<Duration>) {
        self.writer.abort();
        let _ = (&mut self.writer).await;

        let exited = match grace {
            Some(grace) => tokio::time::timeout(grace.min(EXIT_GRACE), self.child.wait())
                .await
                .is_ok_and(|status| status.is_ok()),
            None => false,
        };

        if let Some(group) = self.group.take() {
            kill_group(group);
        }

        if !exited {
            // kill() also waits for the child.
            if let Err(e) = self.child.kill().await {
                tracing::debug!("failed to kill MCP server process: {e}");
            }
        }

        self.reader.abort();
    }
}

impl Drop for PipeConnection {
    fn drop(&mut self) {
        if let Some(group) = self.group.take() {
            kill_group(group);
        }
        self.reader.abort();
        self.writer.abort();
    }
}

/// SIGKILL every process left in the group led by `pgid`.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        // ESRCH: nothing left in the group.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::debug!(pgid, "failed to kill MCP server process group: {e}"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
