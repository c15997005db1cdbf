//! # Agent Gateway - The AI-Facing RPC Surface
//!
//! One logical server, two transports. The tool/resource registry is
//! transport-agnostic; the streamable-HTTP endpoint (`/mcp`) and the
//! SSE pair (`/mcp/sse` + `/mcp/message`) both dispatch into it, and
//! the authority gate keeps extension-privileged methods off this
//! surface entirely.
//!
//! ```text
//!   agent ──POST /mcp───────────────► dispatch ─► ToolRegistry
//!   agent ──GET  /mcp/sse ◄─stream── session │
//!         ──POST /mcp/message?session=… ─────┘
//! ```
//!
//! Responses to `/mcp/message` requests arrive on the matching SSE
//! stream; wallet events fan out to every SSE session through the
//! broadcaster.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod authority;
pub mod registry;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;

pub use authority::Authority;
pub use registry::{Resource, ResourceReader, Tool, ToolHandler, ToolOutput, ToolRegistry};
pub use schema::{FieldKind, FieldSpec, InputSchema};
pub use server::{GatewayConfig, GatewayServer};
pub use session::SessionManager;
pub use tools::ToolContext;

/// Default dual-transport listener port (`SSE_PORT`).
pub const DEFAULT_PORT: u16 = 9444;

/// SSE heartbeat cadence.
pub const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
