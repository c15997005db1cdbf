//! JSON-RPC dispatch shared by both transports.
//!
//! `/mcp` and `/mcp/message` feed the same dispatcher; only the way
//! the response travels back differs.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use host_types::error::WireError;
use host_types::{HostError, RpcRequest, RpcResponse};

use crate::authority::Authority;
use crate::registry::ToolRegistry;

/// Transport-agnostic method dispatcher for the agent surface.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    server_name: &'static str,
    server_version: &'static str,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            server_name: host_types::SERVER_NAME,
            server_version: host_types::PROTOCOL_VERSION,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Dispatch one request on behalf of the agent surface.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        debug!(method = request.method.as_str(), "Agent RPC request");
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => RpcResponse::success(
                id,
                json!({
                    "serverInfo": {
                        "name": self.server_name,
                        "version": self.server_version,
                    },
                    "capabilities": {
                        "tools": {},
                        "resources": { "subscribe": true },
                    },
                }),
            ),
            "tools/list" => RpcResponse::success(
                id,
                json!({ "tools": self.registry.list_tools(Authority::Agent) }),
            ),
            "tools/call" => self.call_tool(id, &request.params).await,
            "resources/list" => RpcResponse::success(
                id,
                json!({ "resources": self.registry.list_resources() }),
            ),
            "resources/read" => {
                let uri = request
                    .params
                    .get("uri")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                match self.registry.read_resource(uri).await {
                    Ok(contents) => RpcResponse::success(id, contents),
                    Err(err) => RpcResponse::from_host_error(id, &err),
                }
            }
            method => RpcResponse::from_host_error(
                id,
                &HostError::MethodNotFound {
                    method: method.to_string(),
                },
            ),
        }
    }

    async fn call_tool(&self, id: host_types::RpcId, params: &Value) -> RpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.registry.call_tool(Authority::Agent, name, args).await {
            Ok(output) => RpcResponse::success(id, output.to_content()),
            // Unknown (or cross-surface) tools are a transport-level
            // method_not_found; everything else is a result-error so
            // batch callers keep per-item status.
            Err(err @ HostError::MethodNotFound { .. }) => RpcResponse::from_host_error(id, &err),
            Err(err) => {
                let wire = WireError::from(&err);
                RpcResponse::success(
                    id,
                    json!({
                        "content": [{"type": "text", "text": err.to_string()}],
                        "isError": true,
                        "error": wire,
                    }),
                )
            }
        }
    }
}
