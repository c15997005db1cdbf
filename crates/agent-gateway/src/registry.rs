//! The declarative tool/resource surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use host_types::{HostError, HostResult};

use crate::authority::Authority;
use crate::schema::InputSchema;

/// Handler output: markdown text plus optional structured metadata.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub metadata: Option<Value>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: Value) -> Self {
        Self {
            text: text.into(),
            metadata: Some(metadata),
        }
    }

    /// Wire form: a content list with the text part first.
    pub fn to_content(&self) -> Value {
        let mut result = json!({
            "content": [{"type": "text", "text": self.text}],
        });
        if let Some(metadata) = &self.metadata {
            result["metadata"] = metadata.clone();
        }
        result
    }
}

/// A typed tool handler.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> HostResult<ToolOutput>;
}

/// One registered tool.
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: InputSchema,
    pub authority: Authority,
    pub handler: Arc<dyn ToolHandler>,
}

/// Async reader behind a resource URI.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read(&self) -> HostResult<Value>;
}

/// One registered resource.
pub struct Resource {
    pub uri: &'static str,
    pub name: &'static str,
    pub mime_type: &'static str,
    pub subscribable: bool,
    pub reader: Arc<dyn ResourceReader>,
}

/// The shared surface both transports dispatch into.
///
/// Transport-agnostic on purpose: handlers see JSON arguments and
/// return [`ToolOutput`]; the transports translate to their wire
/// format.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Tool>,
    resources: Vec<Resource>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>, resources: Vec<Resource>) -> Self {
        let tools = tools.into_iter().map(|t| (t.name, t)).collect();
        Self { tools, resources }
    }

    /// Tools visible to the requesting surface, in name order.
    pub fn list_tools(&self, surface: Authority) -> Vec<Value> {
        self.tools
            .values()
            .filter(|t| surface.admits(t.authority))
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.schema.to_json(),
                })
            })
            .collect()
    }

    /// Validate and dispatch a tool call.
    ///
    /// Authority is checked before existence so a cross-surface call
    /// is indistinguishable from an unknown method.
    pub async fn call_tool(
        &self,
        surface: Authority,
        name: &str,
        args: Value,
    ) -> HostResult<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .filter(|t| surface.admits(t.authority))
            .ok_or_else(|| HostError::MethodNotFound {
                method: name.to_string(),
            })?;

        tool.schema.validate(&args)?;
        debug!(tool = name, "Dispatching tool call");
        tool.handler.call(args).await
    }

    /// All registered resources (the resource set is agent-visible).
    pub fn list_resources(&self) -> Vec<Value> {
        self.resources
            .iter()
            .map(|r| {
                json!({
                    "uri": r.uri,
                    "name": r.name,
                    "mimeType": r.mime_type,
                    "subscribable": r.subscribable,
                })
            })
            .collect()
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> HostResult<Value> {
        let resource = self
            .resources
            .iter()
            .find(|r| r.uri == uri)
            .ok_or_else(|| HostError::MethodNotFound {
                method: uri.to_string(),
            })?;
        let body = resource.reader.read().await?;
        Ok(json!({
            "contents": [{
                "uri": resource.uri,
                "mimeType": resource.mime_type,
                "text": serde_json::to_string_pretty(&body)
                    .unwrap_or_else(|_| body.to_string()),
            }],
        }))
    }

    pub fn tool_names(&self, surface: Authority) -> Vec<&'static str> {
        self.tools
            .values()
            .filter(|t| surface.admits(t.authority))
            .map(|t| t.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, args: Value) -> HostResult<ToolOutput> {
            Ok(ToolOutput::with_metadata("ok", args))
        }
    }

    struct StaticResource;

    #[async_trait]
    impl ResourceReader for StaticResource {
        async fn read(&self) -> HostResult<Value> {
            Ok(json!({"chains": ["ethereum"]}))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(
            vec![
                Tool {
                    name: "get_balance",
                    description: "Balance lookup",
                    schema: InputSchema::new(vec![FieldSpec::required(
                        "address",
                        FieldKind::String,
                        "account address",
                    )]),
                    authority: Authority::Agent,
                    handler: Arc::new(Echo),
                },
                Tool {
                    name: "import_wallet",
                    description: "Privileged import",
                    schema: InputSchema::default(),
                    authority: Authority::Extension,
                    handler: Arc::new(Echo),
                },
            ],
            vec![Resource {
                uri: "supported_chains",
                name: "Supported chains",
                mime_type: "application/json",
                subscribable: false,
                reader: Arc::new(StaticResource),
            }],
        )
    }

    #[tokio::test]
    async fn test_list_tools_respects_authority() {
        let registry = registry();
        let agent_tools = registry.tool_names(Authority::Agent);
        assert_eq!(agent_tools, vec!["get_balance"]);
        let extension_tools = registry.tool_names(Authority::Extension);
        assert_eq!(extension_tools, vec!["import_wallet"]);
    }

    #[tokio::test]
    async fn test_cross_surface_call_fails_closed() {
        let registry = registry();
        let err = registry
            .call_tool(Authority::Agent, "import_wallet", json!({}))
            .await
            .unwrap_err();
        // Indistinguishable from an unknown method.
        assert_eq!(
            err,
            HostError::MethodNotFound {
                method: "import_wallet".into()
            }
        );
    }

    #[tokio::test]
    async fn test_validation_runs_before_handler() {
        let registry = registry();
        let err = registry
            .call_tool(Authority::Agent, "get_balance", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_call_and_content_shape() {
        let registry = registry();
        let output = registry
            .call_tool(Authority::Agent, "get_balance", json!({"address": "0xA"}))
            .await
            .unwrap();
        let content = output.to_content();
        assert_eq!(content["content"][0]["type"], "text");
        assert_eq!(content["metadata"]["address"], "0xA");
    }

    #[tokio::test]
    async fn test_read_resource() {
        let registry = registry();
        let result = registry.read_resource("supported_chains").await.unwrap();
        assert_eq!(result["contents"][0]["mimeType"], "application/json");
        assert!(result["contents"][0]["text"]
            .as_str()
            .unwrap()
            .contains("ethereum"));

        let err = registry.read_resource("nope").await.unwrap_err();
        assert!(matches!(err, HostError::MethodNotFound { .. }));
    }
}
