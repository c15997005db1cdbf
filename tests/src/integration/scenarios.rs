//! End-to-end flows across the agent and extension surfaces.

use serde_json::json;

use host_bus::SessionTransport;
use host_types::TxStatus;

use crate::harness::{Channels, TestHost};

/// Agent submits a send, the user decides via the extension, the
/// poller walks it to confirmed, and the agent reads the final state.
#[tokio::test(flavor = "multi_thread")]
async fn agent_send_decided_by_extension() {
    let host = TestHost::start(Channels::MockRpc).await;
    let mut agent_events = host.bus.register("agent-sse", SessionTransport::Sse);
    let mut extension = host.start_stdio();

    // Agent queues the transfer.
    let response = host
        .agent_call(
            "send_transaction",
            json!({
                "chain": "ethereum",
                "from": "0xA",
                "to": "0xB",
                "amount": "0.1",
                "token": "ETH",
            }),
        )
        .await;
    let result = response.result.expect("tool result");
    assert!(result.get("isError").is_none());
    let entry_id = result["metadata"]["transaction_id"]
        .as_str()
        .expect("transaction id")
        .to_string();

    // Both surfaces hear that a decision is needed.
    let sse_event = agent_events.recv().await.expect("sse event");
    assert_eq!(sse_event.kind.as_str(), "transaction_confirmation_needed");
    assert_eq!(sse_event.data["id"], entry_id);
    let stdio_event = extension
        .wait_event("transaction_confirmation_needed")
        .await;
    assert_eq!(stdio_event["data"]["id"], entry_id);

    // Extension approves; host signs and submits.
    let approval = extension
        .call("approve_transaction", json!({"transaction_id": entry_id}))
        .await;
    let approved = approval.result.expect("approval result");
    let tx_hash = approved["tx_hash"].as_str().expect("wire hash").to_string();
    assert!(tx_hash.starts_with("0x"));

    // Submission and eventual confirmation are announced.
    let pending_event = extension.wait_event("transaction_pending").await;
    assert_eq!(pending_event["data"]["tx_hash"], tx_hash);
    let confirmed = host.wait_for_status(&tx_hash, TxStatus::Confirmed).await;
    assert!(confirmed.confirmations >= 6);
    extension.wait_event("transaction_confirmed").await;

    // Agent queries the final state by wire hash.
    let response = host
        .agent_call(
            "confirm_transaction",
            json!({"chain": "ethereum", "tx_hash": tx_hash}),
        )
        .await;
    let metadata = &response.result.expect("status result")["metadata"];
    assert_eq!(metadata["status"], "confirmed");
    assert!(metadata["confirmations"].as_u64().unwrap() >= 6);
}

/// Rejecting a suspicious pending entry writes one audit record; a
/// repeat returns `already_decided` and writes nothing.
#[tokio::test(flavor = "multi_thread")]
async fn reject_suspicious_pending() {
    let host = TestHost::start(Channels::Paper).await;

    let response = host
        .agent_call(
            "send_transaction",
            json!({"chain": "bsc", "to": "0xEvil", "amount": "5"}),
        )
        .await;
    let entry_id = response.result.expect("result")["metadata"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = host
        .agent_call(
            "reject_transaction",
            json!({
                "transaction_ids": [entry_id],
                "reason": "suspicious_activity",
                "details": "recipient on a drainer list",
            }),
        )
        .await;
    let results = &response.result.expect("result")["metadata"]["results"];
    assert_eq!(results[0]["rejected"], true);
    let audit_id = results[0]["audit_log_id"].as_str().unwrap().to_string();
    assert_eq!(host.audit.len(), 1);

    let stored = host.pending.get(&entry_id).await.unwrap();
    assert_eq!(stored.status, TxStatus::Rejected);
    assert_eq!(stored.audit_log_id.as_deref(), Some(audit_id.as_str()));

    // Second call: already_decided per id, no extra audit record.
    let response = host
        .agent_call(
            "reject_transaction",
            json!({"transaction_ids": [entry_id], "reason": "suspicious_activity"}),
        )
        .await;
    let results = &response.result.expect("result")["metadata"]["results"];
    assert_eq!(results[0]["rejected"], false);
    assert_eq!(results[0]["error_code"], "already_decided");
    assert_eq!(results[0]["audit_log_id"], audit_id.as_str());
    assert_eq!(host.audit.len(), 1);
}

/// With every broadcast channel down, confirming returns
/// `all_channels_failed` and the entry transitions to failed.
#[tokio::test(flavor = "multi_thread")]
async fn all_broadcast_channels_down() {
    let host = TestHost::start(Channels::None).await;
    let mut extension = host.start_stdio();

    let response = host
        .agent_call(
            "send_transaction",
            json!({"chain": "ethereum", "to": "0xB", "amount": "1"}),
        )
        .await;
    let entry_id = response.result.expect("result")["metadata"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let approval = extension
        .call("approve_transaction", json!({"transaction_id": entry_id}))
        .await;
    let error = approval.error.expect("error response");
    assert_eq!(error.code, -32012);

    let stored = host.pending.get(&entry_id).await.unwrap();
    assert_eq!(stored.status, TxStatus::Failed);
}

/// A subscriber at capacity misses exactly the overflowing event;
/// other subscribers are unaffected, and one dequeue re-opens the tap.
#[tokio::test(flavor = "multi_thread")]
async fn sse_drop_under_load() {
    use host_types::{EventKind, WalletEvent};

    let host = TestHost::start(Channels::Paper).await;
    let mut slow = host.bus.register("slow", SessionTransport::Sse);
    let mut fast = host.bus.register("fast", SessionTransport::Sse);

    // Fill both queues to the capacity of 100, then drain only fast.
    for height in 0..100u64 {
        host.bus.broadcast(WalletEvent::new(
            EventKind::BlockNew,
            json!({"height": height}),
        ));
    }
    for height in 0..100u64 {
        assert_eq!(fast.recv().await.unwrap().data["height"], height);
    }

    // Overflow: dropped for the still-full slow subscriber only.
    host.bus.broadcast(WalletEvent::new(
        EventKind::BlockNew,
        json!({"height": 100}),
    ));
    assert_eq!(host.bus.dropped_for("slow"), Some(1));
    assert_eq!(host.bus.dropped_for("fast"), Some(0));
    assert_eq!(fast.recv().await.unwrap().data["height"], 100);

    // One dequeue, and the next broadcast reaches the slow subscriber.
    assert_eq!(slow.recv().await.unwrap().data["height"], 0);
    host.bus.broadcast(WalletEvent::new(
        EventKind::BlockNew,
        json!({"height": 101}),
    ));
    for height in 1..100u64 {
        assert_eq!(slow.recv().await.unwrap().data["height"], height);
    }
    assert_eq!(slow.recv().await.unwrap().data["height"], 101);
}

/// Chain names fold case and hashes normalize to 0x-prefixed form.
#[tokio::test(flavor = "multi_thread")]
async fn chain_folding_and_hash_normalization() {
    let host = TestHost::start(Channels::Paper).await;

    for chain in ["eth", "ETH", "ethereum", "Ethereum"] {
        let response = host
            .agent_call("get_balance", json!({"chain": chain, "address": "0xA"}))
            .await;
        let metadata = &response.result.expect("result")["metadata"];
        assert_eq!(metadata["chain"], "ethereum");
    }

    // Unknown chain surfaces as unsupported_chain, not a crash.
    let response = host
        .agent_call("get_balance", json!({"chain": "dogecoin"}))
        .await;
    let result = response.result.expect("result");
    assert_eq!(result["isError"], true);
    assert_eq!(result["error"]["code"], "unsupported_chain");

    // Unprefixed hash comes back 0x-prefixed.
    let response = host
        .agent_call(
            "confirm_transaction",
            json!({"chain": "ethereum", "tx_hash": "ABCD1234"}),
        )
        .await;
    let metadata = &response.result.expect("result")["metadata"];
    assert_eq!(metadata["tx_hash"], "0xabcd1234");
    assert_eq!(metadata["status"], "unknown");
}

/// Confirmation thresholds: family defaults apply, and an explicit
/// override passes through unmodified.
#[tokio::test(flavor = "multi_thread")]
async fn required_confirmation_defaults_and_override() {
    let host = TestHost::start(Channels::Paper).await;

    let response = host
        .agent_call(
            "send_transaction",
            json!({"chain": "ethereum", "to": "0xB", "amount": "1"}),
        )
        .await;
    let metadata = response.result.expect("result")["metadata"].clone();
    assert_eq!(metadata["required_confirmations"], 6);

    let response = host
        .agent_call(
            "send_transaction",
            json!({"chain": "bsc", "to": "0xB", "amount": "1"}),
        )
        .await;
    let metadata = response.result.expect("result")["metadata"].clone();
    assert_eq!(metadata["required_confirmations"], 3);

    let response = host
        .agent_call(
            "send_transaction",
            json!({"chain": "ethereum", "to": "0xB", "amount": "1", "required_confirmations": 12}),
        )
        .await;
    let metadata = response.result.expect("result")["metadata"].clone();
    assert_eq!(metadata["required_confirmations"], 12);
}

/// `get_pending_transactions` with limit 0 returns an empty page but
/// still counts the matching set.
#[tokio::test(flavor = "multi_thread")]
async fn pending_list_limit_zero() {
    let host = TestHost::start(Channels::Paper).await;
    for i in 0..3 {
        host.agent_call(
            "send_transaction",
            json!({"chain": "ethereum", "to": format!("0xB{i}"), "amount": "1"}),
        )
        .await;
    }

    let response = host
        .agent_call("get_pending_transactions", json!({"limit": 0}))
        .await;
    let metadata = &response.result.expect("result")["metadata"];
    assert_eq!(metadata["transactions"].as_array().unwrap().len(), 0);
    assert_eq!(metadata["total_count"], 3);
    assert_eq!(metadata["has_more"], true);
}

/// The sign-message flow parks a signature request and resolves it
/// with the adapter's signature on approval.
#[tokio::test(flavor = "multi_thread")]
async fn sign_message_flow() {
    let host = TestHost::start(Channels::Paper).await;
    let mut extension = host.start_stdio();

    let response = host
        .agent_call(
            "sign_message",
            json!({"chain": "ethereum", "message": "hello world"}),
        )
        .await;
    let entry_id = response.result.expect("result")["metadata"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    extension.wait_event("signature_confirmation_needed").await;
    let approval = extension
        .call("approve_transaction", json!({"transaction_id": entry_id}))
        .await;
    assert!(approval.error.is_none());

    let resolved = extension.wait_event("transaction_confirmed").await;
    let signature = resolved["data"]["signature"].as_str().unwrap();
    assert!(signature.starts_with("0x"));
}

/// Swap quoting parks a swap entry carrying the quote.
#[tokio::test(flavor = "multi_thread")]
async fn swap_quote_parks_pending_entry() {
    let host = TestHost::start(Channels::Paper).await;

    let response = host
        .agent_call(
            "swap_tokens",
            json!({
                "chain": "ethereum",
                "from_token": "ETH",
                "to_token": "USDC",
                "amount": "2",
            }),
        )
        .await;
    let result = response.result.expect("result");
    assert!(result.get("isError").is_none());
    let metadata = &result["metadata"];
    assert_eq!(metadata["status"], "pending");
    let out: f64 = metadata["quote"]["amount_out"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(out > 2900.0);

    let entry_id = metadata["transaction_id"].as_str().unwrap();
    let stored = host.pending.get(entry_id).await.unwrap();
    assert_eq!(stored.kind, host_types::TxKind::Swap);
}

/// The DApp conduit: a web3 send parks an entry and pushes the
/// resolution as a correlated event.
#[tokio::test(flavor = "multi_thread")]
async fn web3_request_conduit() {
    let host = TestHost::start(Channels::MockRpc).await;
    let mut extension = host.start_stdio();

    let response = extension
        .call(
            "web3_request",
            json!({
                "method": "eth_sendTransaction",
                "chain": "ethereum",
                "params": [{"from": "0xA", "to": "0xB", "value": "0.25"}],
            }),
        )
        .await;
    let ack = response.result.expect("ack");
    assert_eq!(ack["status"], "pending_confirmation");
    let correlation = ack["correlation"].as_str().unwrap().to_string();
    let entry_id = ack["transaction_id"].as_str().unwrap().to_string();

    // The confirmation-needed push carries the correlation token.
    let needed = extension
        .wait_event("transaction_confirmation_needed")
        .await;
    assert_eq!(needed["data"]["correlation"], correlation);

    // Agent approves; the resolution event still carries the token.
    let response = host
        .agent_call("confirm_transaction", json!({"transaction_id": entry_id}))
        .await;
    assert!(response.result.expect("result").get("isError").is_none());
    let pending_event = extension.wait_event("transaction_pending").await;
    assert_eq!(pending_event["data"]["correlation"], correlation);

    // Read-only conduit calls answer inline.
    let response = extension
        .call(
            "web3_request",
            json!({"method": "eth_chainId", "chain": "bsc"}),
        )
        .await;
    assert_eq!(response.result.unwrap(), json!("0x38"));
}
