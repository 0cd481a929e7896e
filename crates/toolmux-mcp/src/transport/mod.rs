//! Wire transports and the deadline-bounded scope every exchange runs in.

mod http;
mod sse;
mod stdio;

pub(crate) use http::StreamConnection;
pub(crate) use stdio::PipeConnection;

use crate::channel::RpcChannel;
use crate::error::McpError;
use std::future::Future;
use std::time::{Duration, Instant};

/// A live transport instance. Each exchange opens its own.
pub(crate) enum Connection {
    Pipe(PipeConnection),
    Stream(StreamConnection),
}

impl Connection {
    /// Release the transport. A `grace` period lets a child process exit by
    /// itself first.
    pub async fn close(self, grace: Option<Duration>) {
        match self {
            Self::Pipe(conn) => conn.close(grace).await,
            Self::Stream(conn) => conn.close().await,
        }
    }
}

/// Run `op` against `rpc` under `deadline`, then release `conn`.
///
/// The connection is closed on success, error and expiry alike, and a graceful
/// close only gets whatever is left of `deadline`. An expired deadline becomes
/// `McpError::Timeout` for `operation`.
pub(crate) async fn run_scoped<T, F, Fut>(
    conn: Connection,
    rpc: RpcChannel,
    deadline: Duration,
    operation: &'static str,
    op: F,
) -> Result<T, McpError>
where
    F: FnOnce(RpcChannel) -> Fut,
    Fut: Future<Output = Result<T, McpError>>,
{
    let server = rpc.server().to_string();
    let started = Instant::now();
    let outcome = tokio::time::timeout(deadline, op(rpc)).await;

    let grace = matches!(outcome, Ok(Ok(_))).then(|| deadline.saturating_sub(started.elapsed()));
    conn.close(grace).await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(server = %server, operation, "deadline expired");
            Err(McpError::Timeout {
                server,
                operation,
                timeout_ms: deadline.as_millis() as u64,
            })
        }
    }
}
