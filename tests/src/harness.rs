//! Shared end-to-end harness: the full host stack on in-memory pipes
//! and mock chain adapters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{duplex, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::time::timeout;

use agent_gateway::rpc::Dispatcher;
use agent_gateway::tools::{build_registry, ToolContext};
use agent_gateway::SessionManager;
use host_bus::EventBroadcaster;
use host_runtime::adapters::{MockChain, MockDex};
use host_runtime::stdio::framing::{read_frame, write_frame};
use host_runtime::stdio::{MethodContext, MethodTable, StdioEndpoint};
use host_types::ports::Dex;
use host_types::{ChainRouter, ChainTag, RpcRequest, RpcResponse, Shutdown, TxStatus};
use pending_tx::{AuditLog, InMemoryAuditLog, PendingTxRegistry, RegistryConfig};
use tx_broadcast::{BroadcastChannel, BroadcastManager, PaperChannel, RpcChannel};
use wallet_store::{WalletStore, WalletStoreConfig};

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const TEST_PASSWORD: &str = "hunter22pass";

/// Which broadcast channels the harness wires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// Direct RPC over the mock chain adapters.
    MockRpc,
    /// Paper channel only.
    Paper,
    /// Nothing enabled: every submission fails over to nothing.
    None,
}

/// The full host stack, minus real sockets and real stdio.
pub struct TestHost {
    pub shutdown: Arc<Shutdown>,
    pub bus: Arc<EventBroadcaster>,
    pub store: Arc<WalletStore>,
    pub pending: Arc<PendingTxRegistry>,
    pub chains: Arc<ChainRouter>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
    pub audit: Arc<InMemoryAuditLog>,
    pub methods: Arc<MethodTable>,
    _dir: TempDir,
}

impl TestHost {
    pub async fn start(channels: Channels) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let shutdown = Arc::new(Shutdown::new());

        let chains = Arc::new(ChainRouter::new());
        for chain in ChainTag::ALL {
            chains.register(Arc::new(MockChain::new(chain, vec![])));
        }
        let dex: Arc<dyn Dex> = Arc::new(MockDex::new());

        let mut store_config = WalletStoreConfig::new(dir.path());
        store_config.idle_lock_timeout = None;
        let store =
            Arc::new(WalletStore::open(store_config, Arc::clone(&chains)).expect("wallet store"));
        store
            .import(TEST_MNEMONIC, TEST_PASSWORD, ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .expect("import wallet");

        let bus = Arc::new(EventBroadcaster::new());
        let audit = Arc::new(InMemoryAuditLog::new());

        let channel_list: Vec<Arc<dyn BroadcastChannel>> = match channels {
            Channels::MockRpc => vec![Arc::new(RpcChannel::new(Arc::clone(&chains)))],
            Channels::Paper => vec![Arc::new(PaperChannel::new(true))],
            Channels::None => vec![],
        };
        let manager = Arc::new(BroadcastManager::new(channel_list, shutdown.listener()));

        let pending = PendingTxRegistry::new(
            Arc::clone(&bus),
            Arc::clone(&audit) as Arc<dyn AuditLog>,
            Arc::clone(&store),
            Arc::clone(&manager),
            Arc::clone(&chains),
            RegistryConfig::for_testing(),
            shutdown.listener(),
        );

        let tool_ctx = Arc::new(ToolContext {
            store: Arc::clone(&store),
            pending: Arc::clone(&pending),
            chains: Arc::clone(&chains),
            dex,
            bus: Arc::clone(&bus),
        });
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(build_registry(tool_ctx))));
        let sessions = Arc::new(SessionManager::new());

        let methods = Arc::new(MethodTable::new(Arc::new(MethodContext {
            store: Arc::clone(&store),
            pending: Arc::clone(&pending),
            bus: Arc::clone(&bus),
            chains: Arc::clone(&chains),
            sse_port: 9444,
            sse_base_url: "http://127.0.0.1:9444".to_string(),
            start_time: chrono_now(),
            started: Instant::now(),
        })));

        Self {
            shutdown,
            bus,
            store,
            pending,
            chains,
            dispatcher,
            sessions,
            audit,
            methods,
            _dir: dir,
        }
    }

    /// Spawn the stdio endpoint on in-memory pipes and hand back the
    /// peer (extension) side.
    pub fn start_stdio(&self) -> StdioClient {
        let (host_in, client_out) = duplex(64 * 1024);
        let (client_in, host_out) = duplex(64 * 1024);

        let endpoint = StdioEndpoint::new(
            Arc::clone(&self.methods),
            Arc::clone(&self.bus),
            Arc::clone(&self.shutdown),
        );
        let handle = tokio::spawn(async move {
            endpoint.run(host_in, host_out).await;
        });

        let (reader, _) = tokio::io::split(client_in);
        let (_, writer) = tokio::io::split(client_out);
        StdioClient {
            reader,
            writer,
            next_id: 1,
            buffered_events: Vec::new(),
            pub_handle: handle,
        }
    }

    /// Call an agent tool through the dispatcher and return the RPC
    /// result value.
    pub async fn agent_call(&self, name: &str, arguments: Value) -> RpcResponse {
        self.dispatcher
            .dispatch(RpcRequest {
                id: json!(1),
                method: "tools/call".to_string(),
                params: json!({"name": name, "arguments": arguments}),
            })
            .await
    }

    /// Wait until the registry reports the given status for an entry.
    pub async fn wait_for_status(&self, id: &str, status: TxStatus) -> host_types::PendingTransaction {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            if let Ok(tx) = self.pending.get(id).await {
                if tx.status == status {
                    return tx;
                }
            }
            assert!(
                Instant::now() < deadline,
                "entry {id} never reached {status:?}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

type PipeReader = ReadHalf<tokio::io::DuplexStream>;
type PipeWriter = WriteHalf<tokio::io::DuplexStream>;

/// The extension side of the stdio pipe.
pub struct StdioClient {
    reader: PipeReader,
    writer: PipeWriter,
    next_id: u64,
    buffered_events: Vec<Value>,
    pub pub_handle: tokio::task::JoinHandle<()>,
}

impl StdioClient {
    /// Issue one RPC and wait for its response, buffering any event
    /// frames that arrive in between.
    pub async fn call(&mut self, method: &str, params: Value) -> RpcResponse {
        let id = self.next_id;
        self.next_id += 1;

        let frame = json!({
            "type": "rpc_request",
            "id": id,
            "method": method,
            "params": params,
        });
        write_frame(&mut self.writer, &frame).await.expect("write frame");

        let deadline = Duration::from_secs(3);
        loop {
            let value = timeout(deadline, read_frame(&mut self.reader))
                .await
                .expect("response timeout")
                .expect("pipe error")
                .expect("pipe closed before response");

            if value.get("type").and_then(Value::as_str) == Some("rpc_response")
                && value.get("id").and_then(Value::as_u64) == Some(id)
            {
                return serde_json::from_value(strip_type(value)).expect("response shape");
            }
            self.buffered_events.push(value);
        }
    }

    /// Next event frame pushed by the host (FIFO, including buffered).
    pub async fn next_event(&mut self) -> Value {
        if !self.buffered_events.is_empty() {
            return self.buffered_events.remove(0);
        }
        loop {
            let value = timeout(Duration::from_secs(3), read_frame(&mut self.reader))
                .await
                .expect("event timeout")
                .expect("pipe error")
                .expect("pipe closed");
            if value.get("type").and_then(Value::as_str) != Some("rpc_response") {
                return value;
            }
            // Unmatched response; drop it.
        }
    }

    /// Wait for a specific event type, skipping others.
    pub async fn wait_event(&mut self, event_type: &str) -> Value {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            assert!(
                Instant::now() < deadline,
                "event {event_type} never arrived"
            );
            let event = self.next_event().await;
            if event.get("type").and_then(Value::as_str) == Some(event_type) {
                return event;
            }
        }
    }

    /// Drop both pipe halves (simulating the browser killing the
    /// pipe) and hand back the endpoint task handle.
    pub fn close_pipe(self) -> tokio::task::JoinHandle<()> {
        self.pub_handle
    }

    /// True once the host has closed its side of the pipe.
    pub async fn read_until_eof(&mut self) -> bool {
        loop {
            match timeout(Duration::from_secs(2), read_frame(&mut self.reader)).await {
                Ok(Ok(Some(value))) => self.buffered_events.push(value),
                Ok(Ok(None)) => return true,
                Ok(Err(_)) => return true,
                Err(_) => return false,
            }
        }
    }
}

fn strip_type(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.remove("type");
    }
    value
}

/// Drive any reader/writer pair manually (framing-level tests).
pub async fn roundtrip_frame<S>(stream: &mut S, value: &Value) -> Value
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, value).await.expect("write");
    read_frame(stream)
        .await
        .expect("read")
        .expect("frame present")
}
