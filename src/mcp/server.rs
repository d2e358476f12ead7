//! Line-delimited JSON-RPC server over stdio.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolsCallParams, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use super::tools::tool_definitions;
use crate::commands::Dispatcher;
use crate::errors::Error;

pub const SERVER_NAME: &str = "memrelay";
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP request handler.
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Handle one request; notifications produce no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "invalid jsonrpc version"));
        }

        if request.id.is_none() {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {"tools": {"listChanged": false}}
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": tool_definitions(self.dispatcher.defaults()) }),
            ),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };

        Some(response)
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        match self.dispatcher.call_tool(&parsed.name, &parsed.arguments).await {
            Ok(output) => match serde_json::to_value(output.to_call_result()) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(err) => JsonRpcResponse::error(
                    id,
                    crate::output::ErrorKind::Internal.code(),
                    err.to_string(),
                ),
            },
            Err(tool_error) => JsonRpcResponse::error(id, tool_error.kind.code(), tool_error.message),
        }
    }

    /// Serve requests from stdin until it closes, writing responses to stdout.
    pub async fn serve_stdio(self) -> Result<(), Error> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve line-delimited requests from `input` until it closes.
    ///
    /// Each request runs as its own task, so slow backend calls do not
    /// block later requests; responses are written in completion order.
    /// Lines that are not UTF-8 JSON get a parse error and the loop goes on.
    pub async fn serve<R, W>(self, input: R, output: W) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer = tokio::spawn(write_responses(output, rx));

        let server = Arc::new(self);
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(err) => {
                    warn!(error = %err, "request is not valid UTF-8");
                    let _ = tx.send(JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("parse error: {err}"),
                    ));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(err) => {
                    warn!(error = %err, "unparseable request");
                    let _ = tx.send(JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("parse error: {err}"),
                    ));
                    continue;
                }
            };

            let server = Arc::clone(&server);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    let _ = tx.send(response);
                }
            });
        }

        debug!("input closed");
        drop(tx);
        match writer.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(error = %join_err, "response writer task failed");
                Ok(())
            }
        }
    }
}

/// Write each response as one line; ends once every sender is gone.
pub async fn write_responses<W>(
    mut out: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}
