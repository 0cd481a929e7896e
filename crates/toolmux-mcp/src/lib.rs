//! MCP (Model Context Protocol) client layer for toolmux.
//!
//! Servers are reached over one of two transports: a spawned child process
//! speaking newline-delimited JSON-RPC 2.0 on stdin/stdout, or an HTTP
//! server-sent-events stream with a POST back-channel. Both sit behind the
//! [`Session`] trait. [`McpManager`] brings up every configured server,
//! skipping the ones that fail, and exposes their tools as
//! [`CapabilityAdapter`]s that validate arguments before calling out.
//!
//! Every exchange opens a fresh connection and runs under a deadline; the
//! connection is released before the call returns, whatever the outcome.

pub mod adapter;
mod channel;
pub mod config;
pub mod debug_log;
pub mod error;
pub mod jsonrpc;
pub mod manager;
pub mod pipe;
pub mod probe;
pub mod protocol;
pub mod schema;
pub mod session;
pub mod stream;
mod transport;

pub use adapter::CapabilityAdapter;
pub use config::{McpConfig, ServerConfig, TransportKind};
pub use debug_log::{DebugLog, LogEntry, LogLevel};
pub use error::McpError;
pub use manager::McpManager;
pub use pipe::PipeSession;
pub use protocol::{CapabilityDescriptor, PROTOCOL_VERSION, ToolCallResult};
pub use session::{Session, SessionState};
pub use stream::StreamSession;
