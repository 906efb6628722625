//! The tool-call envelope carried inside an MCP `tools/call` request's
//! `arguments`, and the `{success, message, data, error}` shape every tool
//! handler returns as its `content`.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub details: String,
}

impl ToolResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        ToolResponse {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_no_data(message: impl Into<String>) -> Self {
        ToolResponse {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn err(err: &ToolError) -> Self {
        ToolResponse {
            success: false,
            message: err.to_string(),
            data: None,
            error: Some(ErrorBody {
                code: err.wire_code(),
                details: err.to_string(),
            }),
        }
    }
}
