//! Line-delimited connection tests over in-memory duplex streams.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use agentic_context_mcp::config::ServerConfig;
use agentic_context_mcp::protocol::ProtocolHandler;
use agentic_context_mcp::session::StateManager;
use agentic_context_mcp::tools::default_registry;
use agentic_context_mcp::transport::{serve_connection, LineTransport};
use agentic_context_mcp::types::McpResult;

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<McpResult<()>>,
}

impl Client {
    async fn send(&mut self, msg: Value) {
        let mut line = serde_json::to_vec(&msg).unwrap();
        line.push(b'\n');
        self.writer.write_all(&line).await.unwrap();
    }

    async fn send_raw(&mut self, raw: &[u8]) {
        self.writer.write_all(raw).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self
            .lines
            .next_line()
            .await
            .unwrap()
            .expect("connection closed before response");
        serde_json::from_str(&line).unwrap()
    }
}

fn connect(handler: ProtocolHandler) -> Client {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let server = tokio::spawn(serve_connection(
        handler,
        LineTransport::new(server_read, server_write),
    ));
    let (client_read, writer) = tokio::io::split(client);
    Client {
        lines: BufReader::new(client_read).lines(),
        writer,
        server,
    }
}

fn request(id: impl Into<Value>, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id.into(), "method": method, "params": params })
}

fn initialize(id: i64) -> Value {
    request(id, "initialize", json!({ "protocolVersion": "2025-06-18" }))
}

#[tokio::test]
async fn test_pipelined_requests_match_ids() {
    let handler = ProtocolHandler::in_memory().unwrap();
    let store = handler.store();
    let mut client = connect(handler);

    client.send(initialize(0)).await;
    for i in 1..=20 {
        client
            .send(request(i, "create_task", json!({ "order_id": format!("ORD-{i}") })))
            .await;
    }

    let init = client.recv().await;
    assert_eq!(init["id"], 0);
    assert_eq!(init["result"]["protocolVersion"], "2025-06-18");

    let mut seen = BTreeSet::new();
    for _ in 1..=20 {
        let resp = client.recv().await;
        assert!(resp.get("result").is_some(), "create_task failed: {resp}");
        let id = resp["id"].as_i64().unwrap();
        let order = resp["result"]["id"].as_str().unwrap().to_string();
        assert_eq!(order, format!("ORD-{id}"));
        seen.insert(id);
    }
    assert_eq!(seen, (1..=20).collect::<BTreeSet<_>>());
    assert_eq!(store.records_of("task").len(), 20);

    client.writer.shutdown().await.unwrap();
    client.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_request_before_initialize() {
    let handler = ProtocolHandler::in_memory().unwrap();
    let store = handler.store();
    let mut client = connect(handler);

    client
        .send(request(1, "create_task", json!({ "order_id": "ORD-1" })))
        .await;
    let resp = client.recv().await;
    assert_eq!(resp["error"]["code"], -32002);
    assert!(store.records.is_empty());

    client.send(initialize(2)).await;
    let resp = client.recv().await;
    assert!(resp.get("result").is_some());
}

#[tokio::test]
async fn test_malformed_line_keeps_connection() {
    let handler = ProtocolHandler::in_memory().unwrap();
    let mut client = connect(handler);

    client.send(initialize(0)).await;
    client.recv().await;

    client.send_raw(b"{not json}\n").await;
    let resp = client.recv().await;
    assert_eq!(resp["error"]["code"], -32700);
    assert_eq!(resp["id"], Value::Null);

    client.send_raw(b"\n\n").await;
    client.send(request("after", "ping", json!({}))).await;
    let resp = client.recv().await;
    assert_eq!(resp["id"], "after");
    assert_eq!(resp["result"], json!({}));
}

#[tokio::test]
async fn test_failed_negotiation_ends_connection() {
    let handler = ProtocolHandler::in_memory().unwrap();
    let mut client = connect(handler);

    client
        .send(request(1, "initialize", json!({ "protocolVersions": ["0.0.1"] })))
        .await;
    let resp = client.recv().await;
    assert_eq!(resp["error"]["code"], -32000);

    client.server.await.unwrap().unwrap();
    assert!(client.lines.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn test_shutdown_saves_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conn.actx");
    let handler = ProtocolHandler::new(
        default_registry().unwrap(),
        StateManager::open(&path).unwrap(),
        ServerConfig::default(),
    );
    let mut client = connect(handler);

    client.send(initialize(0)).await;
    client.recv().await;
    client
        .send(request(
            1,
            "inject_context",
            json!({ "name": "Instruction", "role": "system", "content": "Stay on topic." }),
        ))
        .await;
    client.recv().await;
    client.send(request(2, "shutdown", json!({}))).await;
    let resp = client.recv().await;
    assert_eq!(resp["id"], 2);
    assert_eq!(resp["result"], json!({}));

    client.server.await.unwrap().unwrap();
    assert!(path.exists());

    let reopened = StateManager::open(&path).unwrap();
    let slot = reopened.store().slots.get("Instruction").unwrap();
    assert_eq!(slot.content, "Stay on topic.");
}
