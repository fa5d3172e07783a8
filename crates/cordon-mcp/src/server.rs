//! MCP server over STDIO
//!
//! Reads newline-delimited JSON-RPC requests from stdin, dispatches to the
//! adapter, writes responses to stdout.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::adapter::SandboxToolAdapter;
use crate::protocol::*;

pub const SERVER_NAME: &str = "cordon";
const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    adapter: SandboxToolAdapter,
}

impl McpServer {
    pub fn new(adapter: SandboxToolAdapter) -> Self {
        Self { adapter }
    }

    /// Serve until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("MCP server starting on STDIO");

        let mut stdout = io::stdout();
        let mut lines = BufReader::new(io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("MCP received: {}", log_preview(line));

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(err) => {
                    warn!("Invalid JSON-RPC request: {}", err);
                    let response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {err}"));
                    write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request).await {
                write_response(&mut stdout, &response).await?;
            }
        }

        info!("MCP server STDIO closed");
        Ok(())
    }

    pub(crate) async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: ServerInfo {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).ok()?,
                ))
            }

            // notifications get no response
            "notifications/initialized" => {
                info!("MCP client initialized");
                None
            }

            "tools/list" => {
                let tools = self.adapter.list_tools();
                debug!("MCP tools/list: returning {} tools", tools.len());
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::json!({ "tools": tools }),
                ))
            }

            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        "Missing 'name' parameter".to_string(),
                    ));
                }
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(serde_json::json!({}));

                info!("MCP tools/call: {}", name);
                let result = self.adapter.call_tool(name, arguments).await;
                match serde_json::to_value(result) {
                    Ok(value) => Some(JsonRpcResponse::success(id, value)),
                    Err(err) => Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Unserializable result: {err}"),
                    )),
                }
            }

            "ping" => Some(JsonRpcResponse::success(id, serde_json::json!({}))),

            _ => {
                warn!("MCP unknown method: {}", request.method);
                if request.id.is_none() {
                    None
                } else {
                    Some(JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        format!("Unknown method: {}", request.method),
                    ))
                }
            }
        }
    }
}

/// First 200 characters of a wire message for debug logs. Truncates on a
/// char boundary so multibyte payloads cannot slice mid-character.
fn log_preview(message: &str) -> &str {
    message
        .char_indices()
        .nth(200)
        .map_or(message, |(index, _)| &message[..index])
}

async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;
    debug!("MCP sending: {}", log_preview(&json));
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
