//! Request/response correlation shared by both transports.
//!
//! A transport owns the I/O tasks; the `RpcChannel` is the cloneable handle
//! those tasks and the protocol code share. Outbound messages go into an mpsc
//! queue drained by the transport's writer task. Inbound responses are routed
//! to the waiting request by id. When the transport dies it closes the
//! channel, failing every pending and future request instead of leaving
//! callers waiting for their deadline.

use crate::error::McpError;
use crate::jsonrpc::{Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};

/// Capacity of the outbound message queue.
const OUTBOUND_CAPACITY: usize = 64;

#[derive(Default)]
struct Shared {
    pending: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: Option<String>,
}

/// Cloneable handle for sending JSON-RPC messages over one transport instance.
#[derive(Clone)]
pub(crate) struct RpcChannel {
    server: Arc<str>,
    next_id: Arc<AtomicU64>,
    outbound: mpsc::Sender<String>,
    shared: Arc<Mutex<Shared>>,
}

impl RpcChannel {
    /// Create a channel and the receiving end of its outbound queue.
    pub fn new(server: &str) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let channel = Self {
            server: Arc::from(server),
            next_id: Arc::new(AtomicU64::new(1)),
            outbound,
            shared: Arc::new(Mutex::new(Shared::default())),
        };
        (channel, rx)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Send a request and wait for the matching response.
    ///
    /// There is no per-request timeout here; callers bound the whole exchange.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let serialized = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut shared = self.shared.lock().await;
            if let Some(reason) = &shared.closed {
                return Err(McpError::ConnectionClosed {
                    reason: reason.clone(),
                });
            }
            shared.pending.insert(id, tx);
        }

        tracing::debug!(server = %self.server, id, method, "sending request");

        if self.outbound.send(serialized).await.is_err() {
            self.shared.lock().await.pending.remove(&id);
            return Err(self.closed_error().await);
        }

        match rx.await {
            Ok(resp) => Ok(resp),
            Err(_) => Err(self.closed_error().await),
        }
    }

    /// Send a notification (fire-and-forget, no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let serialized = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        if self.outbound.send(serialized).await.is_err() {
            return Err(self.closed_error().await);
        }
        Ok(())
    }

    /// Parse one inbound message and route it if it answers a pending request.
    pub async fn dispatch_message(&self, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }

        let incoming: Incoming = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(server = %self.server, "Failed to parse MCP message: {e}: {raw}");
                return;
            }
        };

        // Server-initiated requests and notifications are not answered.
        let Some(resp) = incoming.into_response() else {
            return;
        };

        if let Some(id) = resp.id {
            if let Some(tx) = self.shared.lock().await.pending.remove(&id) {
                let _ = tx.send(resp);
            }
        }
    }

    /// Mark the transport as gone and fail all pending requests.
    ///
    /// The first reason recorded wins.
    pub async fn close(&self, reason: impl Into<String>) {
        let mut shared = self.shared.lock().await;
        if shared.closed.is_none() {
            shared.closed = Some(reason.into());
        }
        shared.pending.clear();
    }

    async fn closed_error(&self) -> McpError {
        let reason = self
            .shared
            .lock()
            .await
            .closed
            .clone()
            .unwrap_or_else(|| "transport closed".to_string());
        McpError::ConnectionClosed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn response_is_routed_by_id() {
        let (channel, mut outbound) = RpcChannel::new("test");

        let responder = channel.clone();
        tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                let req: serde_json::Value = serde_json::from_str(&msg).unwrap();
                let reply = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "result": {"echo": req["method"]}
                });
                responder.dispatch_message(&reply.to_string()).await;
            }
        });

        let resp = channel.request("tools/list", None).await.unwrap();
        assert_eq!(resp.result.unwrap()["echo"], "tools/list");
        let resp = channel.request("tools/call", None).await.unwrap();
        assert_eq!(resp.id, Some(2));
    }

    #[tokio::test]
    async fn close_fails_pending_request_with_reason() {
        let (channel, _outbound) = RpcChannel::new("test");

        let closer = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            closer.close("server exited").await;
        });

        match channel.request("initialize", None).await {
            Err(McpError::ConnectionClosed { reason }) => assert_eq!(reason, "server exited"),
            other => panic!("Expected ConnectionClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_after_close_fail_immediately() {
        let (channel, _outbound) = RpcChannel::new("test");
        channel.close("gone").await;
        channel.close("second reason is ignored").await;
        match channel.request("tools/list", None).await {
            Err(McpError::ConnectionClosed { reason }) => assert_eq!(reason, "gone"),
            other => panic!("Expected ConnectionClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_and_notifications_are_ignored() {
        let (channel, _outbound) = RpcChannel::new("test");
        channel.dispatch_message("not json").await;
        channel.dispatch_message("").await;
        channel
            .dispatch_message(r#"{"jsonrpc":"2.0","method":"notifications/message"}"#)
            .await;
        channel
            .dispatch_message(r#"{"jsonrpc":"2.0","id":99,"result":{}}"#)
            .await;
    }

    #[tokio::test]
    async fn notify_fails_once_writer_is_gone() {
        let (channel, outbound) = RpcChannel::new("test");
        drop(outbound);
        assert!(matches!(
            channel.notify("notifications/initialized", None).await,
            Err(McpError::ConnectionClosed { .. })
        ));
    }
}
