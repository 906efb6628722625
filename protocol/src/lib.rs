//! Wire-level tool protocol for the orchestrator: the `{tool, arguments}` /
//! `{success, message, data, error}` envelope carried inside an MCP
//! `tools/call` request, and the dispatch table that turns a decoded call
//! into engine operations.

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod params;

pub use dispatcher::Dispatcher;
pub use envelope::{ErrorBody, ToolCall, ToolResponse};
pub use error::ToolError;
