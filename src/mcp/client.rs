//! Streamable-HTTP session with one MCP server.

use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ResourceContents};
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt};
use rmcp::transport::StreamableHttpClientTransport;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{OctoragError, Result};

type DynClientService = Box<dyn DynService<RoleClient>>;
type McpRunningService = RunningService<RoleClient, DynClientService>;

/// A tool as the server advertises it.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

pub struct McpClient {
    url: String,
    session: McpRunningService,
}

impl McpClient {
    /// Open a session and complete the initialize handshake.
    pub async fn connect(url: &str) -> Result<Self> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let session = ClientInfo::default()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(map_initialize_error)?;
        info!(url, "connected to MCP server");
        Ok(Self {
            url: url.to_string(),
            session,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        let tools = match self.session.list_all_tools().await {
            Ok(tools) => tools,
            // Servers without pagination support answer only the first page.
            Err(ServiceError::UnexpectedResponse) => {
                self.session
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error("list_tools", e))?
                    .tools
            }
            Err(e) => return Err(map_service_error("list_tools", e)),
        };
        debug!(url = %self.url, count = tools.len(), "listed MCP tools");
        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    /// Call `name` and return its text content.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let arguments = coerce_arguments(arguments)?;
        let result = self
            .session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;
        map_call_result(name, result)
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient").field("url", &self.url).finish()
    }
}

fn map_tool_schema(tool: rmcp::model::Tool) -> McpToolSchema {
    McpToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

/// Models sometimes send arguments as a JSON-encoded string.
pub(crate) fn coerce_arguments(value: Value) -> Result<Option<JsonObject>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                OctoragError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_arguments(parsed)
        }
        other => Err(OctoragError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn text_content(content: &[Content]) -> Option<String> {
    let lines: Vec<String> = content
        .iter()
        .filter_map(|item| {
            if let Some(text) = item.as_text() {
                return Some(text.text.clone());
            }
            match &item.as_resource()?.resource {
                ResourceContents::TextResourceContents { text, .. } => Some(text.clone()),
                _ => None,
            }
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<String> {
    let text = text_content(&result.content);
    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text)
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(OctoragError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }
    Ok(text
        .or_else(|| result.structured_content.map(|v| v.to_string()))
        .unwrap_or_default())
}

fn map_initialize_error(error: ClientInitializeError) -> OctoragError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            OctoragError::Mcp(format!("connection closed during initialize: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            OctoragError::Mcp(format!("transport error during initialize ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => OctoragError::Mcp(format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        other => OctoragError::Mcp(format!("initialize failed: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> OctoragError {
    match error {
        ServiceError::McpError(error) => OctoragError::Mcp(format!(
            "{context}: error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportSend(error) => {
            OctoragError::Mcp(format!("{context}: transport send failed: {error}"))
        }
        ServiceError::TransportClosed => OctoragError::Mcp(format!("{context}: transport closed")),
        ServiceError::UnexpectedResponse => {
            OctoragError::Mcp(format!("{context}: unexpected response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason.map(|r| format!(" ({r})")).unwrap_or_default();
            OctoragError::Mcp(format!("{context}: request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => OctoragError::Timeout(timeout.as_millis() as u64),
        other => OctoragError::Mcp(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn arguments_accept_objects_and_encoded_objects() {
        let direct = coerce_arguments(json!({"html_url": "https://github.com/a/b"}))
            .unwrap()
            .unwrap();
        assert_eq!(direct["html_url"], "https://github.com/a/b");

        let encoded = coerce_arguments(json!(r#"{"keywords":"raytracer"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(encoded["keywords"], "raytracer");

        assert!(coerce_arguments(Value::Null).unwrap().is_none());
        assert!(coerce_arguments(json!("  ")).unwrap().is_none());
    }

    #[test]
    fn arguments_reject_non_objects() {
        assert!(matches!(
            coerce_arguments(json!(["keywords"])),
            Err(OctoragError::InvalidArgument(_))
        ));
        assert!(matches!(
            coerce_arguments(json!(r#"{"keywords":"#)),
            Err(OctoragError::InvalidArgument(m)) if m.contains("valid JSON")
        ));
    }

    #[test]
    fn tool_schema_keeps_the_input_schema() {
        let mut schema = serde_json::Map::new();
        schema.insert("type".into(), json!("object"));
        let tool = rmcp::model::Tool::new("get_readme", "Fetch a README", schema);

        let mapped = map_tool_schema(tool);

        assert_eq!(mapped.name, "get_readme");
        assert_eq!(mapped.description.as_deref(), Some("Fetch a README"));
        assert_eq!(mapped.input_schema["type"], "object");
    }

    #[test]
    fn text_items_are_joined() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "Name: serde" },
                { "type": "text", "text": "Stars: 9000" }
            ]
        }))
        .unwrap();

        assert_eq!(map_call_result("query_for_github_repos", result).unwrap(), "Name: serde\nStars: 9000");
    }

    #[test]
    fn error_result_becomes_tool_execution_error() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{ "type": "text", "text": "repository not found" }],
            "isError": true
        }))
        .unwrap();

        let err = map_call_result("get_readme", result).unwrap_err();
        assert!(matches!(
            err,
            OctoragError::ToolExecution { tool_name, message }
                if tool_name == "get_readme" && message == "repository not found"
        ));
    }

    #[test]
    fn service_timeout_keeps_its_duration() {
        let err = map_service_error(
            "call_tool",
            ServiceError::Timeout {
                timeout: Duration::from_millis(1500),
            },
        );
        assert!(matches!(err, OctoragError::Timeout(1500)));
    }

    #[test]
    fn cancellation_reason_is_kept() {
        let err = map_service_error(
            "list_tools",
            ServiceError::Cancelled {
                reason: Some("shutdown".into()),
            },
        );
        assert!(matches!(err, OctoragError::Mcp(m) if m.contains("shutdown")));
    }
}
