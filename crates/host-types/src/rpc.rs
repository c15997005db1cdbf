//! JSON-RPC wire envelope shared by both transports.
//!
//! The agent surface and the stdio surface speak the same two-party
//! shape: `{id, method, params}` in, `{id, result | error}` out. The
//! stdio pipe additionally tags every frame with a `type` field so
//! unsolicited event pushes can interleave with responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

/// Request/response correlation ID: string or number per JSON-RPC.
pub type RpcId = Value;

/// An incoming RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: RpcId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Error member of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An outgoing RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RpcId, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Map a host error to its stdio wire form, attaching structured
    /// details when the kind carries them.
    pub fn from_host_error(id: RpcId, err: &HostError) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorObject {
                code: err.stdio_code(),
                message: err.to_string(),
                data: err.details(),
            }),
        }
    }
}

/// Request/response frame kinds on the stdio pipe, distinguished by
/// `type`. Event pushes are not listed here: they are written as the
/// bare event object, whose own `type` field names the domain event
/// (`status`, `error`, `transaction_confirmed`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StdioFrame {
    /// Peer → host request.
    #[serde(rename = "rpc_request")]
    Request(RpcRequest),
    /// Host → peer response.
    #[serde(rename = "rpc_response")]
    Response(RpcResponse),
}
