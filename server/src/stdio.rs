//! Line-delimited JSON-RPC 2.0 transport over stdin/stdout, implementing
//! just enough of MCP to carry `initialize` / `initialized` / `tools/list` /
//! `tools/call`. One request or notification per line; one response per
//! request written back with a trailing newline.

use anyhow::Result;
use orchestrator_protocol::{Dispatcher, ToolCall};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Handshake state. A client must complete `initialize` then send the
/// `initialized` notification before any other request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum McpState {
    WaitingForInitialize,
    WaitingForInitialized,
    Ready,
}

pub struct StdioMcpServer {
    dispatcher: Arc<Dispatcher>,
}

impl StdioMcpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn serve(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut state = McpState::WaitingForInitialize;

        while let Some(line) = reader.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = self.process_message(trimmed, &mut state).await;
            if let Some(response) = response {
                let serialized = serde_json::to_string(&response)?;
                stdout.write_all(serialized.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    async fn process_message(&self, line: &str, state: &mut McpState) -> Option<Value> {
        let message: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                return Some(create_error_response(
                    Value::Null,
                    -32700,
                    &format!("parse error: {err}"),
                ));
            }
        };

        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let is_notification = message.get("id").is_none();

        match (*state, method) {
            (McpState::WaitingForInitialize, "initialize") => {
                *state = McpState::WaitingForInitialized;
                Some(initialize_response(id))
            }
            (McpState::WaitingForInitialize, _) => Some(create_error_response(
                id,
                -32002,
                "server not initialized, expected 'initialize' first",
            )),
            (McpState::WaitingForInitialized, "notifications/initialized") => {
                *state = McpState::Ready;
                None
            }
            (McpState::WaitingForInitialized, _) => {
                if is_notification {
                    None
                } else {
                    Some(create_error_response(
                        id,
                        -32002,
                        "waiting for 'notifications/initialized'",
                    ))
                }
            }
            (McpState::Ready, "tools/list") => Some(tools_list_response(id)),
            (McpState::Ready, "tools/call") => Some(self.execute_tool_call(id, &message).await),
            (McpState::Ready, "ping") => Some(json!({"jsonrpc": "2.0", "id": id, "result": {}})),
            (McpState::Ready, other) => {
                if is_notification {
                    None
                } else {
                    Some(create_error_response(
                        id,
                        -32601,
                        &format!("method not found: {other}"),
                    ))
                }
            }
        }
    }

    async fn execute_tool_call(&self, id: Value, message: &Value) -> Value {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let name = params.get("name").and_then(Value::as_str);
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let Some(name) = name else {
            return create_error_response(id, -32602, "missing required field 'name'");
        };

        let call = ToolCall {
            tool: name.to_string(),
            arguments,
        };
        let response = self.dispatcher.dispatch(call).await;

        let content = match serde_json::to_value(&response) {
            Ok(value) => value,
            Err(err) => return create_error_response(id, -32603, &err.to_string()),
        };

        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{"type": "text", "text": content.to_string()}],
                "isError": !response.success,
            }
        })
    }
}

fn initialize_response(id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "task-orchestrator",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {
                "tools": {}
            }
        }
    })
}

fn tools_list_response(id: Value) -> Value {
    let names = [
        "manage_container",
        "query_container",
        "manage_sections",
        "manage_dependencies",
        "query_dependencies",
        "get_blocked_tasks",
        "get_next_task",
        "get_next_status",
        "request_transition",
        "request_transition_batch",
        "query_role_transitions",
        "list_tags",
        "health_check",
    ];

    let tools: Vec<Value> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("task orchestrator tool: {name}"),
                "inputSchema": {
                    "type": "object",
                    "additionalProperties": true,
                }
            })
        })
        .collect();

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {"tools": tools}
    })
}

fn create_error_response(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}
