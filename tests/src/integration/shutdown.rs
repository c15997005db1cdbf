//! Graceful shutdown semantics.

use std::time::Duration;

use serde_json::json;

use host_bus::SessionTransport;

use crate::harness::{Channels, TestHost};

/// `shutdown` over stdio replies, closes the pipe, and trips the root
/// signal; no further events are delivered afterwards.
#[tokio::test(flavor = "multi_thread")]
async fn stdio_shutdown_is_graceful() {
    let host = TestHost::start(Channels::Paper).await;
    let mut extension = host.start_stdio();

    let response = extension.call("shutdown", json!({})).await;
    assert_eq!(response.result.expect("result")["status"], "shutting_down");

    assert!(
        extension.read_until_eof().await,
        "host did not close the pipe"
    );
    assert!(host.shutdown.is_triggered());

    // The endpoint task itself winds down.
    tokio::time::timeout(Duration::from_secs(3), extension.pub_handle)
        .await
        .expect("endpoint did not stop")
        .expect("endpoint task panicked");

    // The stdio subscriber is gone; broadcasting reaches nobody.
    let delivered = host.bus.broadcast(host_types::WalletEvent::new(
        host_types::EventKind::BlockNew,
        json!({"height": 1}),
    ));
    assert_eq!(delivered, 0);
}

/// Stdio EOF (the browser killed the pipe) also trips shutdown.
#[tokio::test(flavor = "multi_thread")]
async fn stdio_eof_triggers_shutdown() {
    let host = TestHost::start(Channels::Paper).await;
    let extension = host.start_stdio();

    // Dropping the client closes both pipe halves.
    let handle = extension.close_pipe();

    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("endpoint did not stop on EOF")
        .expect("endpoint task panicked");
    assert!(host.shutdown.is_triggered());
}

/// Root shutdown closes event queues for live subscribers promptly.
#[tokio::test(flavor = "multi_thread")]
async fn root_shutdown_drains_subscribers() {
    let host = TestHost::start(Channels::Paper).await;
    let mut queue = host.bus.register("s", SessionTransport::Sse);

    host.bus.broadcast(host_types::WalletEvent::new(
        host_types::EventKind::BlockNew,
        json!({"height": 7}),
    ));
    host.shutdown.trigger();

    // Buffered events still drain; then the queue closes once the
    // session is unregistered.
    let event = queue.recv().await.expect("buffered event");
    assert_eq!(event.data["height"], 7);
    host.bus.unregister("s");
    assert!(queue.recv().await.is_none());
}
