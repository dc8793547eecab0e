//! End-to-end protocol tests over the stdio transport
//!
//! Drives a full server (registry, processor, adapter, transport) through an
//! in-memory stream pair, asserting the literal wire exchanges.

use quartz_mcp::prelude::*;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

struct Client {
    reader: BufReader<ReadHalf<tokio::io::DuplexStream>>,
    writer: WriteHalf<tokio::io::DuplexStream>,
}

impl Client {
    async fn send(&mut self, frame: Value) {
        self.writer
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a frame")
            .unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    /// Assert no frame arrives within a short window
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let outcome =
            tokio::time::timeout(Duration::from_millis(300), self.reader.read_line(&mut line))
                .await;
        assert!(outcome.is_err(), "unexpected frame: {line}");
    }
}

async fn start_server(server: McpServer) -> (Client, tokio::task::JoinHandle<()>) {
    let (client_stream, server_stream) = tokio::io::duplex(16 * 1024);
    let (server_read, server_write) = tokio::io::split(server_stream);
    let transport =
        StdioServerTransport::with_streams(server_read, server_write, server.session_store());

    let handle = tokio::spawn(async move {
        let _ = server.run_with_transport(transport).await;
    });

    let (client_read, client_write) = tokio::io::split(client_stream);
    (
        Client {
            reader: BufReader::new(client_read),
            writer: client_write,
        },
        handle,
    )
}

async fn test_server() -> McpServer {
    let server = McpServer::new("TestServer", "1.0.0");

    server
        .add_tool(
            ToolSpec::new(
                "add",
                json!({
                    "type": "object",
                    "properties": {
                        "a": {"type": "integer"},
                        "b": {"type": "integer"}
                    },
                    "required": ["a", "b"]
                }),
            ),
            FnTool(|args: HashMap<String, Value>| {
                let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(Value::String((a + b).to_string()))
            }),
        )
        .await
        .unwrap();

    server
        .add_resource_template(
            TemplateSpec::new("config://{key}", "config"),
            FnResource(|_: &str, params: &HashMap<String, String>| {
                Ok(format!(
                    "config value for {}",
                    params.get("key").cloned().unwrap_or_default()
                ))
            }),
        )
        .await
        .unwrap();

    server
}

fn initialize_frame(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "c", "version": "1"}
        }
    })
}

async fn handshake(client: &mut Client) {
    client.send(initialize_frame(1)).await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], json!(1));
    client
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    // A ping roundtrip pins down that the notification has been applied
    client
        .send(json!({"jsonrpc": "2.0", "id": 99, "method": "ping"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], json!(99));
}

#[tokio::test]
async fn stdio_handshake_then_ping() {
    let (mut client, server) = start_server(test_server().await).await;

    client.send(initialize_frame(1)).await;
    let reply = client.recv().await;
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(reply["result"]["serverInfo"]["name"], "TestServer");
    assert_eq!(
        reply["result"]["capabilities"]["tools"]["listChanged"],
        json!(true)
    );

    client
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    client.expect_silence().await;

    client
        .send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], json!(2));
    assert_eq!(reply["result"], json!({}));

    server.abort();
}

#[tokio::test]
async fn requests_before_handshake_get_32001() {
    let (mut client, server) = start_server(test_server().await).await;

    client
        .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["error"]["code"], json!(-32001));

    server.abort();
}

#[tokio::test]
async fn tool_call_coerces_string_argument() {
    let (mut client, server) = start_server(test_server().await).await;
    handshake(&mut client).await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "add", "arguments": {"a": "2", "b": 3}}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["result"]["content"][0]["type"], "text");
    assert_eq!(reply["result"]["content"][0]["text"], "5");
    assert_eq!(reply["result"]["isError"], json!(false));

    server.abort();
}

#[tokio::test]
async fn tool_call_validation_failure_names_pointer() {
    let (mut client, server) = start_server(test_server().await).await;
    handshake(&mut client).await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "add", "arguments": {"a": "nope", "b": 3}}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["error"]["code"], json!(-32602));
    assert!(
        reply["error"]["message"].as_str().unwrap().contains("/a"),
        "error should reference /a: {}",
        reply["error"]["message"]
    );

    server.abort();
}

#[tokio::test]
async fn template_read_invokes_handler_with_variables() {
    let (mut client, server) = start_server(test_server().await).await;
    handshake(&mut client).await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": {"uri": "config://timeout"}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(
        reply["result"]["contents"][0]["text"],
        "config value for timeout"
    );
    assert_eq!(
        reply["result"]["contents"][0]["uri"],
        "config://timeout"
    );

    server.abort();
}

#[tokio::test]
async fn unknown_resource_reports_32002() {
    let (mut client, server) = start_server(test_server().await).await;
    handshake(&mut client).await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": {"uri": "nope://missing"}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["error"]["code"], json!(-32002));

    server.abort();
}

#[tokio::test]
async fn batch_answers_in_request_order_without_notifications() {
    let (mut client, server) = start_server(test_server().await).await;

    client
        .send(json!([
            initialize_frame(1),
            {"jsonrpc": "2.0", "method": "notifications/initialized"},
            {"jsonrpc": "2.0", "id": 2, "method": "ping"},
            {"jsonrpc": "2.0", "id": 3, "method": "tools/call",
             "params": {"name": "add", "arguments": {"a": 1, "b": 2}}}
        ]))
        .await;

    let reply = client.recv().await;
    let batch = reply.as_array().expect("batch reply is an array");
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0]["id"], json!(1));
    assert_eq!(batch[1]["id"], json!(2));
    assert_eq!(batch[2]["id"], json!(3));
    assert_eq!(batch[2]["result"]["content"][0]["text"], "3");

    server.abort();
}

#[tokio::test]
async fn malformed_line_gets_parse_error_with_null_id() {
    let (mut client, server) = start_server(test_server().await).await;

    client.writer.write_all(b"{oops\n").await.unwrap();
    client.writer.flush().await.unwrap();

    let reply = client.recv().await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], json!(-32700));

    server.abort();
}

#[tokio::test]
async fn list_changed_notification_reaches_stdio_client() {
    let server = test_server().await;
    let registry = server.registry();
    let (mut client, handle) = start_server(server).await;
    handshake(&mut client).await;

    // Late registration triggers a broadcast to initialized sessions
    registry
        .register_tool(
            ToolSpec::new("late", json!({"type": "object"})),
            FnTool(|_: HashMap<String, Value>| Ok(Value::Null)),
            SpecOrigin::Manual,
        )
        .await
        .unwrap();

    let reply = client.recv().await;
    assert_eq!(reply["method"], "notifications/tools/list_changed");

    handle.abort();
}

#[tokio::test]
async fn unsupported_protocol_version_answers_with_preferred() {
    let (mut client, server) = start_server(test_server().await).await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "1999-01-01",
                "clientInfo": {"name": "c", "version": "1"}
            }
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["result"]["protocolVersion"], LATEST_PROTOCOL_VERSION);

    server.abort();
}
