//! Exposes MCP server tools through the [`Tool`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::client::{McpClient, McpToolSchema};
use crate::error::Result;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// The calls the bridge makes on an MCP session.
#[async_trait]
pub trait McpToolCaller: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolSchema>>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}

#[async_trait]
impl McpToolCaller for McpClient {
    async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        McpClient::call_tool(self, name, arguments).await
    }
}

/// One server tool. All tools from one server share its session.
pub struct McpTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    caller: Arc<dyn McpToolCaller>,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments, _ctx: &ToolExecutionContext) -> Result<String> {
        self.caller.call_tool(&self.name, args.raw().clone()).await
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool").field("name", &self.name).finish()
    }
}

/// List the caller's tools and wrap each one, keeping the server's names.
pub async fn bridge_tools(caller: Box<dyn McpToolCaller>) -> Result<Vec<Arc<dyn Tool>>> {
    let schemas = caller.list_tools().await?;
    let caller: Arc<dyn McpToolCaller> = Arc::from(caller);
    Ok(schemas
        .into_iter()
        .map(|schema| {
            Arc::new(McpTool {
                name: schema.name,
                description: schema.description.unwrap_or_default(),
                parameters: AgentToolParameters::from_schema(schema.input_schema),
                caller: caller.clone(),
            }) as Arc<dyn Tool>
        })
        .collect())
}

/// Connect to `url` and bridge every tool it serves.
pub async fn discover_tools(url: &str) -> Result<Vec<Arc<dyn Tool>>> {
    let client = McpClient::connect(url).await?;
    let tools = bridge_tools(Box::new(client)).await?;
    tracing::info!(url, count = tools.len(), "bridged MCP tools");
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentName;
    use crate::error::OctoragError;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingCaller {
        calls: Arc<StdMutex<Vec<(String, Value)>>>,
    }

    #[async_trait]
    impl McpToolCaller for RecordingCaller {
        async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
            Ok(vec![
                McpToolSchema {
                    name: "get_readme".into(),
                    description: Some("Fetch a README".into()),
                    input_schema: json!({
                        "type": "object",
                        "properties": { "html_url": { "type": "string" } },
                        "required": ["html_url"]
                    }),
                },
                McpToolSchema {
                    name: "create_repo".into(),
                    description: None,
                    input_schema: json!({ "type": "object" }),
                },
            ])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            if name == "create_repo" {
                return Err(OctoragError::ToolExecution {
                    tool_name: name.into(),
                    message: "token lacks repo scope".into(),
                });
            }
            Ok(format!("{name} ok"))
        }
    }

    fn ctx() -> ToolExecutionContext {
        ToolExecutionContext {
            tool_call_id: "c1".into(),
            agent: AgentName::from("Repository Curator"),
            thread_id: "1".into(),
        }
    }

    #[tokio::test]
    async fn bridged_tools_keep_server_names_and_schemas() {
        let tools = bridge_tools(Box::<RecordingCaller>::default()).await.unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["get_readme", "create_repo"]);
        assert_eq!(tools[0].description(), "Fetch a README");
        assert_eq!(tools[0].parameters().schema["required"], json!(["html_url"]));
        assert_eq!(tools[1].description(), "");
    }

    #[tokio::test]
    async fn execute_forwards_name_and_arguments() {
        let caller = RecordingCaller::default();
        let calls = caller.calls.clone();
        let tools = bridge_tools(Box::new(caller)).await.unwrap();

        let args = ToolArguments::new(json!({"html_url": "https://github.com/a/b"}));
        let text = tools[0].execute(&args, &ctx()).await.unwrap();

        assert_eq!(text, "get_readme ok");
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec![("get_readme".to_string(), json!({"html_url": "https://github.com/a/b"}))]
        );
    }

    #[tokio::test]
    async fn server_tool_errors_are_returned() {
        let tools = bridge_tools(Box::<RecordingCaller>::default()).await.unwrap();

        let err = tools[1]
            .execute(&ToolArguments::new(json!({})), &ctx())
            .await
            .unwrap_err();

        assert!(matches!(err, OctoragError::ToolExecution { tool_name, .. } if tool_name == "create_repo"));
    }
}
