//! MCP (Model Context Protocol) Server Implementation
//!
//! This module provides a minimal MCP server following the JSON-RPC 2.0
//! specification and MCP protocol version 2025-06-18: capability
//! negotiation, tool discovery, and tool invocation over stdio.


pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

pub use errors::{McpError, McpResult};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeResult, ListToolsResult, Tool, ToolContent,
};
pub use server::{McpServer, MessageHandler, SessionState};
pub use tools::{AddHandler, ToolHandler, ToolRegistry};
