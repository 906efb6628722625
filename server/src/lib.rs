//! Process wiring for the stdio task-orchestrator server: configuration,
//! telemetry, and the MCP transport loop. `main.rs` is a thin shell around
//! these modules.

pub mod config;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use stdio::StdioMcpServer;
