// MCP server: JSON-RPC message handling and the stdio transport

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo,
    ToolsCapability, PROTOCOL_VERSION,
};
use crate::tools::{ApiRequestTool, ApiTool, ToolRegistry};
use anyhow::{Context, Result};
use futures::StreamExt;
use relay_core::{Dispatcher, ErrorEnvelope, ProxyConfig};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            info: ServerInfo {
                name: name.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Build the dispatcher and register every configured tool.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::new(config.registry()), config.timeout())
                .context("Failed to create HTTP client")?,
        );

        let mut registry = ToolRegistry::new();
        for tool in &config.tools {
            registry.register(Arc::new(ApiTool::new(tool.clone(), dispatcher.clone())));
        }
        if config.expose_raw_request {
            registry.register(Arc::new(ApiRequestTool::new(dispatcher)));
        }

        tracing::info!(
            project = %config.name,
            connections = config.connections.len(),
            tools = registry.len(),
            "Registered tools"
        );

        Ok(Self::new(config.name.clone(), registry))
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one JSON-RPC message. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    /// Handle one serialized message, answering parse failures with a
    /// JSON-RPC parse error.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle(request).await?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC message");
                JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error())
            }
        };

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON-RPC response");
                None
            }
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)))?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                client_version = %client.version,
                protocol_version = %params.protocol_version,
                "Client initialized"
            );
        }

        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?;

        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        tracing::debug!(tool = %params.name, "Calling tool");

        let result = match tool.execute(params.arguments).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %format!("{:#}", e), "Tool execution failed");
                CallToolResult::error(ErrorEnvelope::new(format!("{:#}", e)).to_json())
            }
        };

        to_result(&result)
    }

    /// Serve newline-delimited JSON-RPC until the reader closes.
    ///
    /// Each message is handled on its own task, so a slow upstream call does
    /// not hold up the others; responses are written as they complete.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(64);

        let writer_task = tokio::spawn(async move {
            while let Some(reply) = rx.recv().await {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = FramedRead::new(reader, LinesCodec::new());
        while let Some(line) = lines.next().await {
            let line = line.context("Failed to read JSON-RPC message")?;
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(reply) = server.handle_line(&line).await {
                    // Receiver only goes away when the writer failed
                    let _ = tx.send(reply).await;
                }
            });
        }

        drop(tx);
        writer_task
            .await
            .context("Writer task panicked")?
            .context("Failed to write JSON-RPC response")?;

        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }

    /// Serve over the process's stdin and stdout
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        tracing::info!(name = %self.info.name, "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
