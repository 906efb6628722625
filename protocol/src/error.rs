//! Maps the engine's error taxonomy onto MCP-compliant JSON-RPC error
//! codes.

use orchestrator_core::error::OrchestratorError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Shorthand for a missing-required-field validation error.
    pub fn empty(field: &str) -> Self {
        ToolError::Validation(format!("field '{field}' is required"))
    }

    pub fn to_error_code(&self) -> i32 {
        match self {
            ToolError::NotFound(_) => -32001,
            ToolError::Validation(_) => -32002,
            ToolError::Conflict(_) => -32003,
            ToolError::Database(_) => -32004,
            ToolError::Protocol(_) => -32005,
            ToolError::Internal(_) => -32006,
        }
    }

    /// Wire-level code string carried in a tool response's `error.code`.
    pub fn wire_code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ToolError::Validation(_) => "VALIDATION_ERROR",
            ToolError::Conflict(_) => "CONFLICT",
            ToolError::Database(_) => "DATABASE_ERROR",
            ToolError::Protocol(_) | ToolError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_json_rpc_error(&self, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.to_error_code(),
                "message": self.to_string(),
            },
            "id": id,
        })
    }
}

impl From<OrchestratorError> for ToolError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::NotFound(kind, id) => ToolError::NotFound(format!("{kind} {id}")),
            OrchestratorError::Validation(msg) => ToolError::Validation(msg),
            OrchestratorError::Conflict(msg) | OrchestratorError::CycleDetected(msg) => {
                ToolError::Conflict(msg)
            }
            OrchestratorError::Database(msg) => ToolError::Database(msg),
            OrchestratorError::Configuration(msg) => {
                ToolError::Internal(format!("configuration error: {msg}"))
            }
            OrchestratorError::Internal(msg) => ToolError::Internal(msg),
        }
    }
}
