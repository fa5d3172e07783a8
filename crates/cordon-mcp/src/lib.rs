//! cordon-mcp — expose the sandbox tool over the Model Context Protocol
//!
//! Wraps `cordon-core`'s tool registry in a newline-delimited JSON-RPC 2.0
//! stdio server so a host agent runtime can call `sandboxed_code.run`.

pub mod adapter;
pub mod protocol;
pub mod server;

use std::sync::Arc;

use cordon_core::runner::{LocalContainerRunner, RunnerConfig};
use cordon_core::tools::{SandboxedCodeConfig, SandboxedCodeTool, ToolRegistry};

pub use adapter::SandboxToolAdapter;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, McpTool, ToolCallResult};
pub use server::{McpServer, SERVER_NAME};

/// Build a ready-to-serve MCP server with the sandboxed-code tool backed
/// by a local container runner.
pub fn sandbox_server(runner: RunnerConfig, tool: SandboxedCodeConfig) -> McpServer {
    let runner = Arc::new(LocalContainerRunner::new(runner));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SandboxedCodeTool::new(runner, tool)));
    McpServer::new(SandboxToolAdapter::new(Arc::new(registry)))
}
