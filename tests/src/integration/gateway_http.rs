//! The dual-transport server over a real loopback socket.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use agent_gateway::{GatewayConfig, GatewayServer};

use crate::harness::{Channels, TestHost};

/// Bind the router on an ephemeral port and return its base URL.
async fn serve(host: &TestHost) -> String {
    let server = GatewayServer::new(
        GatewayConfig {
            port: 0, // unused; we bind our own listener below
            heartbeat_interval: Duration::from_millis(200),
        },
        Arc::clone(&host.dispatcher),
        Arc::clone(&host.sessions),
        Arc::clone(&host.bus),
        host.shutdown.listener(),
    );
    let router = server.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let mut shutdown = host.shutdown.listener();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn streamable_http_request_response() {
    let host = TestHost::start(Channels::Paper).await;
    let base = serve(&host).await;
    let client = reqwest::Client::new();

    // Health first.
    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["status"], "healthy");

    // initialize over /mcp.
    let response: Value = client
        .post(format!("{base}/mcp"))
        .body(json!({"id": 1, "method": "initialize", "params": {}}).to_string())
        .send()
        .await
        .expect("mcp")
        .json()
        .await
        .expect("mcp json");
    assert_eq!(response["id"], 1);
    assert_eq!(
        response["result"]["serverInfo"]["name"],
        "algonius-wallet-host"
    );

    // tools/call over /mcp returns the content list inline.
    let response: Value = client
        .post(format!("{base}/mcp"))
        .body(
            json!({
                "id": 2,
                "method": "tools/call",
                "params": {"name": "get_balance", "arguments": {"chain": "eth", "address": "0xA"}},
            })
            .to_string(),
        )
        .send()
        .await
        .expect("call")
        .json()
        .await
        .expect("call json");
    assert_eq!(response["result"]["content"][0]["type"], "text");
    assert_eq!(response["result"]["metadata"]["chain"], "ethereum");

    // Malformed body: parse error, not a transport failure.
    let response: Value = client
        .post(format!("{base}/mcp"))
        .body("not json")
        .send()
        .await
        .expect("bad body")
        .json()
        .await
        .expect("bad body json");
    assert_eq!(response["error"]["code"], -32700);

    host.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread")]
async fn sse_session_with_message_companion() {
    let host = TestHost::start(Channels::Paper).await;
    let base = serve(&host).await;
    let client = reqwest::Client::new();

    // Open the SSE stream and read the connected event.
    let response = client
        .get(format!("{base}/mcp/sse"))
        .send()
        .await
        .expect("sse connect");
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    let session_id = loop {
        let chunk = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("sse chunk timeout")
            .expect("sse stream ended")
            .expect("sse chunk");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        if let Some(data) = sse_data_for_event(&buffer, "connected") {
            break data["data"]["session_id"].as_str().unwrap().to_string();
        }
    };
    assert!(session_id.starts_with("sse-"));

    // Unknown session on the companion endpoint: 404.
    let status = client
        .post(format!("{base}/mcp/message?session=sse-bogus"))
        .body(json!({"id": 9, "method": "tools/list", "params": {}}).to_string())
        .send()
        .await
        .expect("bogus session")
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

    // A request posted to the companion endpoint is acknowledged and
    // answered on the stream, correlated by request ID.
    let ack: Value = client
        .post(format!("{base}/mcp/message?session={session_id}"))
        .body(json!({"id": 41, "method": "tools/list", "params": {}}).to_string())
        .send()
        .await
        .expect("message")
        .json()
        .await
        .expect("ack json");
    assert_eq!(ack["status"], "accepted");
    assert_eq!(ack["id"], 41);

    let response = loop {
        if let Some(data) = sse_data_for_event(&buffer, "message") {
            break data;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("sse chunk timeout")
            .expect("sse stream ended")
            .expect("sse chunk");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    };
    assert_eq!(response["id"], 41);
    let tools = response["result"]["tools"].as_array().unwrap();
    assert!(!tools.is_empty());

    // Broadcast events reach the stream too.
    host.bus.broadcast(host_types::WalletEvent::new(
        host_types::EventKind::BlockNew,
        json!({"height": 55}),
    ));
    let event = loop {
        if let Some(data) = sse_data_for_event(&buffer, "block_new") {
            break data;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("sse chunk timeout")
            .expect("sse stream ended")
            .expect("sse chunk");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    };
    assert_eq!(event["data"]["height"], 55);

    host.shutdown.trigger();
}

/// Extract the first `data:` payload for a named SSE event from the
/// raw buffer, if a complete record is present.
fn sse_data_for_event(buffer: &str, event_name: &str) -> Option<Value> {
    let mut lines = buffer.lines();
    while let Some(line) = lines.next() {
        if line.strip_prefix("event: ").map(str::trim) == Some(event_name) {
            for candidate in lines.by_ref() {
                if let Some(data) = candidate.strip_prefix("data: ") {
                    return serde_json::from_str(data).ok();
                }
                if candidate.is_empty() {
                    break;
                }
            }
        }
    }
    None
}
