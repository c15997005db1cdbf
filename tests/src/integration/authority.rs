//! The authority partition between the two surfaces.

use serde_json::json;

use host_types::RpcRequest;

use crate::harness::{Channels, TestHost};

/// The agent surface never lists nor accepts extension-privileged
/// methods; the stdio surface accepts them and rejects agent RPC.
#[tokio::test(flavor = "multi_thread")]
async fn surfaces_are_disjoint() {
    let host = TestHost::start(Channels::Paper).await;
    let mut extension = host.start_stdio();

    // tools/list on the agent surface: no privileged methods.
    let response = host
        .dispatcher
        .dispatch(RpcRequest {
            id: json!(1),
            method: "tools/list".to_string(),
            params: json!({}),
        })
        .await;
    let tools = response.result.expect("tools")["tools"].clone();
    let names: Vec<String> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    for privileged in ["import_wallet", "unlock_wallet", "lock_wallet", "web3_request"] {
        assert!(
            !names.contains(&privileged.to_string()),
            "agent surface leaked {privileged}"
        );
    }
    // All required agent tools are present.
    for required in agent_gateway::tools::REQUIRED_AGENT_TOOLS {
        assert!(
            names.contains(&required.to_string()),
            "agent surface is missing {required}"
        );
    }

    // Calling a privileged method through tools/call: method_not_found.
    let response = host
        .agent_call("import_wallet", json!({"mnemonic": "x", "password": "y"}))
        .await;
    assert_eq!(response.error.expect("rpc error").code, -32601);

    // The stdio surface accepts import_wallet (it fails on business
    // rules, not on authority: a wallet already exists).
    let response = extension
        .call(
            "import_wallet",
            json!({
                "mnemonic": crate::harness::TEST_MNEMONIC,
                "password": "another-pass1",
                "chain": "ethereum",
            }),
        )
        .await;
    assert_eq!(response.error.expect("error").code, -32004);

    // And rejects agent-surface RPC outright.
    let response = extension.call("tools/call", json!({"name": "get_balance"})).await;
    assert_eq!(response.error.expect("error").code, -32601);
    let response = extension.call("tools/list", json!({})).await;
    assert_eq!(response.error.expect("error").code, -32601);
}

/// Wallet lifecycle over stdio: unlock/lock round-trip with the
/// indistinct wrong-password error.
#[tokio::test(flavor = "multi_thread")]
async fn stdio_wallet_lifecycle() {
    let host = TestHost::start(Channels::Paper).await;
    let mut extension = host.start_stdio();

    let response = extension.call("lock_wallet", json!({})).await;
    assert_eq!(response.result.expect("result")["locked"], true);

    let response = extension
        .call("unlock_wallet", json!({"password": "wrong-password"}))
        .await;
    assert_eq!(response.error.expect("error").code, -32001);

    let response = extension
        .call("unlock_wallet", json!({"password": crate::harness::TEST_PASSWORD}))
        .await;
    let status = response.result.expect("status");
    assert_eq!(status["is_unlocked"], true);

    // Status/heartbeat surface.
    let response = extension.call("status", json!({})).await;
    let status = response.result.expect("status");
    assert_eq!(status["sse_port"], 9444);
    assert!(status["sse_base_url"].as_str().unwrap().contains("127.0.0.1"));
    assert!(status.get("uptime").is_some());
}
