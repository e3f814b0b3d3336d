//! MCP Error Handling
//!
//! This module provides the error taxonomy for the MCP server, including
//! conversion of each error into its JSON-RPC wire representation.

use crate::mcp::protocol::*;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Protocol version not supported: {requested}. Supported versions: {supported:?}")]
    UnsupportedProtocolVersion {
        requested: String,
        supported: Vec<String>,
    },

    #[error("Server not initialized")]
    NotInitialized,

    #[error("Server already initialized")]
    AlreadyInitialized,

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Missing required parameter '{parameter}' for tool '{tool}'")]
    MissingParameter { tool: String, parameter: String },

    #[error("Invalid type for parameter '{parameter}' of tool '{tool}': expected {expected}")]
    InvalidParameterType {
        tool: String,
        parameter: String,
        expected: &'static str,
    },

    #[error("Tool execution failed for {tool}: {message}")]
    ToolExecutionFailed { tool: String, message: String },

    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::UnsupportedProtocolVersion {
                requested,
                supported,
            } => JsonRpcError::new(
                mcp_error_codes::INVALID_PROTOCOL_VERSION,
                format!(
                    "Unsupported protocol version: {}. Supported: {}",
                    requested,
                    supported.join(", ")
                ),
                Some(json!({ "supported": supported })),
            ),
            Self::NotInitialized => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                "Server not initialized. Send initialize request first.".to_string(),
                None,
            ),
            Self::AlreadyInitialized => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                "Server already initialized.".to_string(),
                None,
            ),
            Self::ToolNotFound { name } => JsonRpcError::new(
                mcp_error_codes::TOOL_NOT_FOUND,
                format!("Tool not found: {}", name),
                None,
            ),
            Self::MissingParameter { tool, parameter } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!(
                    "Missing required parameter '{}' for tool '{}'",
                    parameter, tool
                ),
                Some(json!({ "parameter": parameter })),
            ),
            Self::InvalidParameterType {
                tool,
                parameter,
                expected,
            } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!(
                    "Invalid type for parameter '{}' of tool '{}': expected {}",
                    parameter, tool, expected
                ),
                Some(json!({ "parameter": parameter, "expected": expected })),
            ),
            Self::ToolExecutionFailed { tool, message } => JsonRpcError::new(
                error_codes::INTERNAL_ERROR,
                format!("Tool '{}' execution failed: {}", tool, message),
                None,
            ),
            Self::ParseError { message } => {
                JsonRpcError::new(error_codes::PARSE_ERROR, message.clone(), None)
            }
            Self::MethodNotFound { method } => JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
            Self::InvalidRequest { message } => {
                JsonRpcError::new(error_codes::INVALID_REQUEST, message.clone(), None)
            }
            Self::InternalError { message } => {
                JsonRpcError::new(error_codes::INTERNAL_ERROR, message.clone(), None)
            }
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        let error_response = JsonRpcErrorResponse::new(error, id);
        JsonRpcMessage::ErrorResponse(error_response)
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::InternalError { .. } | Self::ToolExecutionFailed { .. } => {
                error!("Server error: {}", self);
            }
            _ => {
                // Everything else is a recoverable, client-caused condition.
                warn!("Client error: {}", self);
            }
        }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Convert from serde_json::Error to McpError
impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError {
            message: error.to_string(),
        }
    }
}
