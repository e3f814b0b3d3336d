//! MCP Tools Implementation
//!
//! This module provides the tool registry and the single arithmetic tool
//! this server exposes.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult>;
}

/// Addition tool handler
///
/// Stateless; computes a + b with IEEE-754 double precision.
pub struct AddHandler;

impl AddHandler {
    /// Create the add tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "add".to_string(),
            description: Some("Add two numbers and return their sum".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": {
                        "type": "number",
                        "description": "First addend"
                    },
                    "b": {
                        "type": "number",
                        "description": "Second addend"
                    }
                },
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        }
    }

    /// Extract a required numeric argument from the call parameters
    fn numeric_argument(params: &CallToolParams, name: &str) -> McpResult<f64> {
        let value = params
            .arguments
            .as_ref()
            .and_then(|args| args.get(name))
            .ok_or_else(|| McpError::MissingParameter {
                tool: params.name.clone(),
                parameter: name.to_string(),
            })?;

        value.as_f64().ok_or_else(|| McpError::InvalidParameterType {
            tool: params.name.clone(),
            parameter: name.to_string(),
            expected: "number",
        })
    }
}

#[async_trait]
impl ToolHandler for AddHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        let a = Self::numeric_argument(&params, "a")?;
        let b = Self::numeric_argument(&params, "b")?;

        let result = a + b;

        // serde_json renders non-finite floats as null, so an overflowing
        // sum cannot be represented consistently in the result payload.
        if !result.is_finite() {
            return Err(McpError::ToolExecutionFailed {
                tool: params.name,
                message: format!("sum of {} and {} is not a finite number", a, b),
            });
        }

        debug!("add({}, {}) = {}", a, b, result);

        Ok(CallToolResult {
            content: vec![ToolContent::Text {
                text: result.to_string(),
            }],
            structured_content: Some(json!({ "result": result })),
            is_error: Some(false),
        })
    }
}

/// One registry entry: a tool definition paired with its handler
struct RegisteredTool {
    tool: Tool,
    handler: Box<dyn ToolHandler>,
}

/// Tool registry, append-only during startup and read-only afterwards
///
/// Listing preserves registration order.
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty tool registry
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a tool
    ///
    /// A tool re-registered under an existing name replaces the earlier
    /// entry, keeping names unique.
    #[inline]
    pub fn register<H>(&mut self, tool: Tool, handler: H)
    where
        H: ToolHandler + 'static,
    {
        debug!("Registered tool: {}", tool.name);
        self.entries.retain(|entry| entry.tool.name != tool.name);
        self.entries.push(RegisteredTool {
            tool,
            handler: Box::new(handler),
        });
    }

    /// Get all registered tools in registration order
    #[inline]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|entry| entry.tool.clone()).collect()
    }

    /// Get a specific tool by name
    #[inline]
    pub fn get_tool(&self, name: &str) -> Option<&Tool> {
        self.entries
            .iter()
            .find(|entry| entry.tool.name == name)
            .map(|entry| &entry.tool)
    }

    /// Get the handler for a tool by name
    #[inline]
    pub fn handler(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.entries
            .iter()
            .find(|entry| entry.tool.name == name)
            .map(|entry| entry.handler.as_ref())
    }

    /// Number of registered tools
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create the default registry with the built-in arithmetic tool
    #[inline]
    pub fn create_default() -> Self {
        let mut registry = Self::new();
        registry.register(AddHandler::tool_definition(), AddHandler);
        registry
    }
}

impl Default for ToolRegistry {
    #[inline]
    fn default() -> Self {
        Self::create_default()
    }
}
