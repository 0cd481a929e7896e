//! Event-stream transport: responses arrive on a long-lived SSE response,
//! requests are POSTed to the endpoint the server announces on that stream.

use super::sse::SseParser;
use crate::channel::RpcChannel;
use crate::config::ServerConfig;
use crate::error::McpError;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

/// An open event stream and its POST back-channel.
pub(crate) struct StreamConnection {
    pump: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StreamConnection {
    /// Start the stream and writer tasks.
    ///
    /// Connecting happens in the background; failures close the channel so the
    /// first request reports them.
    pub fn open(
        config: &ServerConfig,
        http: &reqwest::Client,
    ) -> Result<(Self, RpcChannel), McpError> {
        let base = Url::parse(config.url())
            .map_err(|e| McpError::Http(format!("Invalid URL '{}': {e}", config.url())))?;
        let headers = header_map(config)?;

        let (channel, outbound) = RpcChannel::new(&config.name);
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        let pump = tokio::spawn(pump_events(
            http.clone(),
            base,
            headers.clone(),
            channel.clone(),
            endpoint_tx,
        ));
        let writer = tokio::spawn(post_messages(
            http.clone(),
            headers,
            channel.clone(),
            endpoint_rx,
            outbound,
        ));

        Ok((Self { pump, writer }, channel))
    }

    /// Abort both tasks, dropping the HTTP connection.
    pub async fn close(mut self) {
        self.writer.abort();
        self.pump.abort();
        let _ = (&mut self.writer).await;
        let _ = (&mut self.pump).await;
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.pump.abort();
        self.writer.abort();
    }
}

fn header_map(config: &ServerConfig) -> Result<HeaderMap, McpError> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| McpError::Http(format!("Invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| McpError::Http(format!("Invalid value for header '{key}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn pump_events(
    http: reqwest::Client,
    base: Url,
    headers: HeaderMap,
    channel: RpcChannel,
    endpoint_tx: oneshot::Sender<Url>,
) {
    // Dropped only after close() so the pump's reason is the one recorded.
    let mut endpoint_tx = Some(endpoint_tx);
    let reason = match read_stream(&http, &base, headers, &channel, &mut endpoint_tx).await {
        Ok(()) => "event stream ended".to_string(),
        Err(e) => e.to_string(),
    };
    tracing::debug!(server = %channel.server(), "{reason}");
    channel.close(reason).await;
    drop(endpoint_tx);
}

async fn read_stream(
    http: &reqwest::Client,
    base: &Url,
    headers: HeaderMap,
    channel: &RpcChannel,
    endpoint_tx: &mut Option<oneshot::Sender<Url>>,
) -> Result<(), McpError> {
    let response = http
        .get(base.clone())
        .headers(headers)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| McpError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(McpError::Http(format!("GET {base} returned {status}")));
    }

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| McpError::Http(e.to_string()))?;
        for event in parser.feed(&chunk) {
            match event.kind() {
                "endpoint" => {
                    let Some(tx) = endpoint_tx.take() else {
                        continue;
                    };
                    let endpoint = base.join(event.data.trim()).map_err(|e| {
                        McpError::Protocol(format!("Invalid endpoint '{}': {e}", event.data))
                    })?;
                    tracing::debug!(server = %channel.server(), %endpoint, "received endpoint");
                    let _ = tx.send(endpoint);
                }
                "message" => channel.dispatch_message(&event.data).await,
                other => {
                    tracing::debug!(server = %channel.server(), "ignoring '{other}' event");
                }
            }
        }
    }

    Ok(())
}

async fn post_messages(
    http: reqwest::Client,
    headers: HeaderMap,
    channel: RpcChannel,
    endpoint_rx: oneshot::Receiver<Url>,
    mut outbound: mpsc::Receiver<String>,
) {
    let Ok(endpoint) = endpoint_rx.await else {
        channel.close("event stream closed before announcing an endpoint").await;
        return;
    };

    while let Some(msg) = outbound.recv().await {
        let result = http
            .post(endpoint.clone())
            .headers(headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(msg)
            .send()
            .await;

        let failure = match result {
            Ok(resp) if resp.status().is_success() => continue,
            Ok(resp) => format!("POST {endpoint} returned {}", resp.status()),
            Err(e) => format!("POST {endpoint} failed: {e}"),
        };
        tracing::warn!(server = %channel.server(), "{failure}");
        channel.close(failure).await;
        return;
    }
}
