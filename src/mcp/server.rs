//! MCP Server Implementation
//!
//! This module owns the per-connection session state machine and the
//! read-dispatch-write loop. Exactly one request is in flight at a time;
//! responses are written in the order their requests arrived.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::tools::ToolRegistry;
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Instructions string advertised during initialization
    pub instructions: Option<String>,
    /// Registered tools, immutable after construction
    registry: ToolRegistry,
    /// Per-connection protocol state
    session: RwLock<Session>,
    /// Message validator
    validator: McpValidator,
}

/// Handshake progress for one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Per-connection protocol state
///
/// Created alongside the server, reset on channel open, destroyed with it.
/// Never shared across connections.
#[derive(Debug, Default)]
pub struct Session {
    pub state: SessionState,
    pub negotiated_version: Option<String>,
    pub client_info: Option<Implementation>,
    pub client_capabilities: Option<ClientCapabilities>,
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    ///
    /// The registry is consumed here; tools cannot be added once the server
    /// exists.
    #[inline]
    pub fn new(name: String, version: String, registry: ToolRegistry) -> Result<Self> {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        let validator = McpValidator::new()?;

        Ok(Self {
            server_info,
            capabilities,
            instructions: None,
            registry,
            session: RwLock::new(Session::default()),
            validator,
        })
    }

    /// Set the instructions string returned from initialize
    #[inline]
    pub fn with_instructions(mut self, instructions: String) -> Self {
        self.instructions = Some(instructions);
        self
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");

        let reader = BufReader::new(io::stdin());
        let stdout = io::stdout();
        self.serve(reader, stdout).await
    }

    /// Run the read-dispatch-write loop over an arbitrary channel
    ///
    /// Returns Ok(()) when the channel reaches EOF. Undecodable lines produce
    /// a per-request error response and the loop continues.
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    // First parse as raw JSON
                    let raw_value: Value = match serde_json::from_str(line) {
                        Ok(value) => value,
                        Err(e) => {
                            let parse_error = McpError::from(e);
                            parse_error.log();
                            self.send_message(&mut writer, &parse_error.to_error_response(None))
                                .await?;
                            continue;
                        }
                    };

                    // Validate and parse as MCP message
                    match self.validator.validate_raw_message(&raw_value) {
                        Ok(message) => {
                            let handler = MessageHandler::new(Arc::clone(&self));
                            if let Err(e) = handler.process_message(message, &mut writer).await {
                                error!("Error processing message: {}", e);
                            }
                        }
                        Err(e) => {
                            // Echo the request id when the envelope carries a
                            // usable one so the client can correlate the error.
                            let id = raw_value
                                .get("id")
                                .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok());
                            let invalid = McpError::InvalidRequest {
                                message: e.to_string(),
                            };
                            invalid.log();
                            self.send_message(&mut writer, &invalid.to_error_response(id))
                                .await?;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from channel: {}", e);
                    break;
                }
            }
        }

        // Channel closure is terminal for the session
        {
            let mut session = self.session.write().await;
            session.state = SessionState::Closed;
        }

        info!("MCP server stopped");
        Ok(())
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Get current session state
    #[inline]
    pub async fn session_state(&self) -> SessionState {
        self.session.read().await.state
    }

    /// Get the negotiated protocol version, if the handshake completed
    #[inline]
    pub async fn negotiated_version(&self) -> Option<String> {
        self.session.read().await.negotiated_version.clone()
    }

    /// Access the tool registry
    #[inline]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message<W>(&self, message: JsonRpcMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request, writer).await,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request<W>(&self, request: JsonRpcRequest, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => self.handle_ping(),
            _ => Err(McpError::MethodNotFound {
                method: request.method.clone(),
            }),
        };

        match response {
            Ok(result) => {
                let response = JsonRpcResponse::new(result, request.id);
                self.server
                    .send_message(writer, &JsonRpcMessage::Response(response))
                    .await
            }
            Err(e) => {
                e.log();
                self.server
                    .send_message(writer, &e.to_error_response(Some(request.id)))
                    .await
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        match notification.method.as_str() {
            "notifications/initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
                Ok(())
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
                Ok(())
            }
        }
    }

    /// Handle initialize request
    ///
    /// On success the session moves to Initializing; it becomes Ready once
    /// the client sends the initialized notification. A version mismatch
    /// leaves the session Uninitialized so the client may retry.
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| McpError::InvalidRequest {
                message: format!("Malformed initialize parameters: {}", e),
            })?,
            None => {
                return Err(McpError::InvalidRequest {
                    message: "Initialize request missing parameters".to_string(),
                });
            }
        };

        let mut session = self.server.session.write().await;

        if session.state != SessionState::Uninitialized {
            return Err(McpError::AlreadyInitialized);
        }

        if !self
            .server
            .validator
            .is_protocol_version_supported(&params.protocol_version)
        {
            return Err(McpError::UnsupportedProtocolVersion {
                requested: params.protocol_version,
                supported: self
                    .server
                    .validator
                    .supported_protocol_versions()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        session.state = SessionState::Initializing;
        session.negotiated_version = Some(params.protocol_version);
        session.client_capabilities = Some(params.capabilities);

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!("Client initialized: {}", params.client_info.name);
        session.client_info = Some(params.client_info);

        serde_json::to_value(result).map_err(McpError::from)
    }

    /// Handle initialized notification
    async fn handle_initialized(&self) -> Result<()> {
        let mut session = self.server.session.write().await;

        if session.state == SessionState::Initializing {
            session.state = SessionState::Ready;
            info!("Server ready to handle requests");
        } else {
            warn!(
                "Ignoring initialized notification in state {:?}",
                session.state
            );
        }

        Ok(())
    }

    /// Guard requiring a completed handshake
    async fn require_ready(&self) -> McpResult<()> {
        let session = self.server.session.read().await;
        if session.state == SessionState::Ready {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> McpResult<Value> {
        self.require_ready().await?;

        let result = ListToolsResult {
            tools: self.server.registry.list_tools(),
        };
        serde_json::to_value(result).map_err(McpError::from)
    }

    /// Handle call tool request
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> McpResult<Value> {
        self.require_ready().await?;

        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| McpError::InvalidRequest {
                message: format!("Malformed tool call parameters: {}", e),
            })?,
            None => {
                return Err(McpError::InvalidRequest {
                    message: "Tool call request missing parameters".to_string(),
                });
            }
        };

        let handler = self
            .server
            .registry
            .handler(&params.name)
            .ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;

        let result = handler.handle(params).await?;
        serde_json::to_value(result).map_err(McpError::from)
    }

    /// Handle ping request
    ///
    /// Valid in any session state.
    #[inline]
    pub fn handle_ping(&self) -> McpResult<Value> {
        Ok(serde_json::json!({}))
    }
}
