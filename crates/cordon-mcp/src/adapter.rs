//! Bridge between the tool registry and the MCP wire format

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use cordon_core::tools::ToolRegistry;

use crate::protocol::{McpTool, ToolCallResult, ToolContent};

/// Adapts a [`ToolRegistry`] to MCP `tools/list` and `tools/call`.
pub struct SandboxToolAdapter {
    registry: Arc<ToolRegistry>,
}

impl SandboxToolAdapter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn list_tools(&self) -> Vec<McpTool> {
        self.registry
            .list()
            .into_iter()
            .map(|handler| McpTool {
                name: handler.name().to_string(),
                description: handler.description().to_string(),
                input_schema: handler.input_schema(),
            })
            .collect()
    }

    /// Execute a tool. Tool-level error results keep their structured
    /// payload; unknown tools and invalid input become plain error blocks.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        let Some(handler) = self.registry.get(name) else {
            return error_result(format!("Unknown tool: {name}"));
        };

        debug!("MCP calling tool: {}", name);
        match handler.execute(arguments).await {
            Ok(output) => ToolCallResult {
                content: vec![ToolContent::text(output.text)],
                structured_content: output.structured,
                is_error: output.is_error.then_some(true),
            },
            Err(err) => error_result(format!("Error: {err}")),
        }
    }
}

fn error_result(message: String) -> ToolCallResult {
    ToolCallResult {
        content: vec![ToolContent::text(message)],
        structured_content: None,
        is_error: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use cordon_core::tools::{ToolHandler, ToolOutput};

    use super::*;

    struct FixedTool {
        fail: bool,
    }

    #[async_trait]
    impl ToolHandler for FixedTool {
        fn name(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "Returns a canned result"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _input: Value) -> Result<ToolOutput> {
            if self.fail {
                anyhow::bail!("bad input");
            }
            Ok(ToolOutput::success(
                "done".to_string(),
                serde_json::json!({"exitCode": 0}),
            ))
        }
    }

    fn adapter_with(fail: bool) -> SandboxToolAdapter {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FixedTool { fail }));
        SandboxToolAdapter::new(Arc::new(registry))
    }

    #[test]
    fn test_list_tools_maps_registry() {
        let adapter = adapter_with(false);
        let tools = adapter.list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "fixed");
        assert!(tools[0].input_schema.is_object());
    }

    #[tokio::test]
    async fn test_call_tool_threads_structured_content() {
        let adapter = adapter_with(false);
        let result = adapter.call_tool("fixed", serde_json::json!({})).await;
        assert!(result.is_error.is_none());
        assert_eq!(result.content[0].text, "done");
        assert_eq!(result.structured_content.unwrap()["exitCode"], 0);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_error() {
        let adapter = adapter_with(false);
        let result = adapter.call_tool("missing", serde_json::json!({})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.content[0].text.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_tool_input_error_is_error_result() {
        let adapter = adapter_with(true);
        let result = adapter.call_tool("fixed", serde_json::json!({})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.content[0].text.contains("bad input"));
    }
}
