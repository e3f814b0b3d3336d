#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! MCP Server Integration Tests
//!
//! End-to-end tests driving the full read-dispatch-write loop over an
//! in-memory duplex channel, exercising the handshake, tool discovery,
//! tool invocation, and error recovery.

use adder_mcp::mcp::protocol::{MCP_VERSION, error_codes, mcp_error_codes};
use adder_mcp::mcp::{McpServer, ToolRegistry};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    server_task: JoinHandle<anyhow::Result<()>>,
}

impl TestClient {
    /// Spawn a server over an in-memory duplex channel and return the
    /// client end.
    fn start() -> Self {
        let server = Arc::new(
            McpServer::new(
                "test-server".to_string(),
                "1.0.0".to_string(),
                ToolRegistry::default(),
            )
            .expect("Failed to create MCP server")
            .with_instructions("test instructions".to_string()),
        );

        let (client_side, server_side) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let server_task =
            tokio::spawn(server.serve(BufReader::new(server_read), server_write));

        let (client_read, client_write) = tokio::io::split(client_side);
        Self {
            reader: BufReader::new(client_read),
            writer: client_write,
            server_task,
        }
    }

    async fn send(&mut self, message: &Value) {
        let mut line = serde_json::to_string(message).expect("serializes");
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("write succeeds");
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("write succeeds");
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .expect("read succeeds");
        assert!(n > 0, "server closed the channel unexpectedly");
        serde_json::from_str(line.trim()).expect("response is valid JSON")
    }

    async fn request(&mut self, id: i64, method: &str, params: Option<Value>) -> Value {
        let mut message = json!({
            "jsonrpc": "2.0",
            "method": method,
            "id": id
        });
        if let Some(params) = params {
            message["params"] = params;
        }
        self.send(&message).await;
        self.recv().await
    }

    async fn notify(&mut self, method: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": method
        }))
        .await;
    }

    /// Run the full handshake: initialize plus initialized notification.
    async fn handshake(&mut self) -> Value {
        let response = self
            .request(1, "initialize", Some(initialize_params(MCP_VERSION)))
            .await;
        assert!(response.get("result").is_some(), "initialize succeeded");
        self.notify("notifications/initialized").await;
        response
    }

    /// Close the client end and wait for the server loop to finish.
    async fn shutdown(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await.expect("shutdown succeeds");
        drop(self.writer);
        self.server_task.await.expect("server task completes")
    }
}

fn initialize_params(version: &str) -> Value {
    json!({
        "protocolVersion": version,
        "capabilities": {},
        "clientInfo": {
            "name": "test-client",
            "version": "1.0.0"
        }
    })
}

/// The complete protocol conversation: handshake, discovery, invocation.
#[tokio::test]
async fn end_to_end_handshake_list_call() {
    let mut client = TestClient::start();

    // initialize
    let response = client
        .request(1, "initialize", Some(initialize_params(MCP_VERSION)))
        .await;
    assert_eq!(response["id"], 1);
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], MCP_VERSION);
    assert_eq!(result["serverInfo"]["name"], "test-server");
    assert_eq!(result["serverInfo"]["version"], "1.0.0");
    assert_eq!(result["instructions"], "test instructions");
    assert!(result["capabilities"]["tools"].is_object());

    client.notify("notifications/initialized").await;

    // tools/list
    let response = client.request(2, "tools/list", None).await;
    assert_eq!(response["id"], 2);
    let tools = response["result"]["tools"].as_array().expect("is array");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "add");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["a", "b"]));

    // tools/call
    let response = client
        .request(
            3,
            "tools/call",
            Some(json!({
                "name": "add",
                "arguments": {"a": 2.5, "b": 3.5}
            })),
        )
        .await;
    assert_eq!(response["id"], 3);
    let result = &response["result"];
    assert_eq!(result["structuredContent"]["result"], json!(6.0));
    assert_eq!(result["isError"], json!(false));
    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(result["content"][0]["text"], "6");

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn requests_before_handshake_are_rejected() {
    let mut client = TestClient::start();

    let response = client
        .request(
            1,
            "tools/call",
            Some(json!({"name": "add", "arguments": {"a": 1, "b": 2}})),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert!(
        response["error"]["message"]
            .as_str()
            .expect("has message")
            .contains("not initialized")
    );

    let response = client.request(2, "tools/list", None).await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);

    // The session is still usable: a handshake now succeeds.
    client.handshake().await;
    let response = client.request(3, "tools/list", None).await;
    assert!(response.get("result").is_some());

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn version_mismatch_then_successful_retry() {
    let mut client = TestClient::start();

    let response = client
        .request(1, "initialize", Some(initialize_params("1999-01-01")))
        .await;
    assert_eq!(
        response["error"]["code"],
        mcp_error_codes::INVALID_PROTOCOL_VERSION
    );
    assert!(
        response["error"]["message"]
            .as_str()
            .expect("has message")
            .contains("1999-01-01")
    );

    // Retry with the supported version succeeds.
    let response = client
        .request(2, "initialize", Some(initialize_params(MCP_VERSION)))
        .await;
    assert_eq!(response["result"]["protocolVersion"], MCP_VERSION);

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn unknown_tool_is_rejected() {
    let mut client = TestClient::start();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            Some(json!({"name": "subtract", "arguments": {"a": 1, "b": 2}})),
        )
        .await;
    assert_eq!(response["error"]["code"], mcp_error_codes::TOOL_NOT_FOUND);
    assert!(
        response["error"]["message"]
            .as_str()
            .expect("has message")
            .contains("subtract")
    );

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn missing_parameter_names_the_parameter() {
    let mut client = TestClient::start();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            Some(json!({"name": "add", "arguments": {"a": 2}})),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert_eq!(response["error"]["data"]["parameter"], "b");

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn invalid_parameter_type_names_parameter_and_type() {
    let mut client = TestClient::start();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            Some(json!({"name": "add", "arguments": {"a": "x", "b": 2}})),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert_eq!(response["error"]["data"]["parameter"], "a");
    assert_eq!(response["error"]["data"]["expected"], "number");

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn malformed_line_is_a_per_request_error() {
    let mut client = TestClient::start();

    client.send_raw("this is not json\n").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    // The channel stays open and processes subsequent requests.
    let response = client.request(1, "ping", None).await;
    assert_eq!(response["result"], json!({}));

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn request_with_null_id_gets_a_response() {
    let mut client = TestClient::start();

    // A null id is not a valid request id, but the envelope is still
    // request-shaped and must be answered, not dropped.
    client
        .send(&json!({
            "jsonrpc": "2.0",
            "method": "ping",
            "id": null
        }))
        .await;

    let response = tokio::time::timeout(std::time::Duration::from_secs(2), client.recv())
        .await
        .expect("server answers instead of dropping the request");
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], Value::Null);

    // The channel stays usable afterwards.
    let response = client.request(1, "ping", None).await;
    assert_eq!(response["result"], json!({}));

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn schema_invalid_request_echoes_its_id() {
    let mut client = TestClient::start();

    // initialize without the required capabilities field fails schema
    // validation; the error response still carries the request id.
    let response = client
        .request(
            7,
            "initialize",
            Some(json!({
                "protocolVersion": MCP_VERSION,
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            })),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], 7);

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn non_finite_sum_is_an_error() {
    let mut client = TestClient::start();
    client.handshake().await;

    let response = client
        .request(
            2,
            "tools/call",
            Some(json!({
                "name": "add",
                "arguments": {"a": f64::MAX, "b": f64::MAX}
            })),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INTERNAL_ERROR);
    assert!(
        response["error"]["message"]
            .as_str()
            .expect("has message")
            .contains("finite")
    );

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn structurally_invalid_envelope_is_rejected() {
    let mut client = TestClient::start();

    client.send_raw("{\"hello\": \"world\"}\n").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let mut client = TestClient::start();
    client.handshake().await;

    let response = client.request(2, "resources/list", None).await;
    assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn ping_works_before_handshake() {
    let mut client = TestClient::start();

    let response = client.request(1, "ping", None).await;
    assert_eq!(response["result"], json!({}));

    client.shutdown().await.expect("server exits cleanly");
}

#[tokio::test]
async fn eof_terminates_the_server_loop() {
    let client = TestClient::start();

    // Closing the channel without any traffic is a clean shutdown.
    client.shutdown().await.expect("server exits cleanly");
}
