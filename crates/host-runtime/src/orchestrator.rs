//! Boots components in dependency order, wires them, and owns the
//! root shutdown signal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};

use agent_gateway::rpc::Dispatcher;
use agent_gateway::tools::{build_registry, ToolContext};
use agent_gateway::{GatewayConfig, GatewayServer, SessionManager};
use host_bus::EventBroadcaster;
use host_types::ports::Dex;
use host_types::{ChainRouter, Shutdown};
use pending_tx::{AuditLog, JsonlAuditLog, PendingTxRegistry, RegistryConfig};
use tx_broadcast::{
    BroadcastChannel, BroadcastManager, BundleChannel, PaperChannel, RelayChannel, RpcChannel,
};
use wallet_store::{WalletStore, WalletStoreConfig};

use crate::adapters::{self, MockDex};
use crate::config::{HostConfig, RunMode};
use crate::stdio::{MethodContext, MethodTable, StdioEndpoint};

/// Interval of the wallet idle-lock sweep.
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Wires and runs the whole host process.
pub struct Orchestrator {
    config: HostConfig,
}

impl Orchestrator {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    /// Boot order: wallet store → broadcaster → pending-tx registry →
    /// broadcast manager → tool registry → stdio endpoint →
    /// dual-transport server. Teardown runs in reverse on shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.config;
        let shutdown = Arc::new(Shutdown::new());

        let chains = adapters::build_chain_router(&config);
        let dex: Arc<dyn Dex> = Arc::new(MockDex::new());

        // Wallet store
        let mut store_config = WalletStoreConfig::new(&config.wallet_dir);
        store_config.idle_lock_timeout = config.idle_lock_timeout;
        let store = Arc::new(
            WalletStore::open(store_config, Arc::clone(&chains))
                .context("opening wallet store")?,
        );

        // Broadcaster
        let bus = Arc::new(EventBroadcaster::new());

        // Pending-tx registry (with its audit log) and the broadcast
        // manager it submits through.
        let audit: Arc<dyn AuditLog> =
            Arc::new(JsonlAuditLog::new(config.wallet_dir.join("audit.jsonl")));
        let manager = Arc::new(BroadcastManager::new(
            build_channels(&config, &chains),
            shutdown.listener(),
        ));
        info!(channels = ?manager.channel_names(), "Broadcast channels ready");
        let pending = PendingTxRegistry::new(
            Arc::clone(&bus),
            audit,
            Arc::clone(&store),
            Arc::clone(&manager),
            Arc::clone(&chains),
            RegistryConfig::default(),
            shutdown.listener(),
        );

        // Tool registry + dual-transport server
        let tool_ctx = Arc::new(ToolContext {
            store: Arc::clone(&store),
            pending: Arc::clone(&pending),
            chains: Arc::clone(&chains),
            dex,
            bus: Arc::clone(&bus),
        });
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(build_registry(tool_ctx))));
        let sessions = Arc::new(SessionManager::new());
        let gateway = GatewayServer::new(
            GatewayConfig {
                port: config.sse_port,
                ..GatewayConfig::default()
            },
            dispatcher,
            sessions,
            Arc::clone(&bus),
            shutdown.listener(),
        );

        // Stdio endpoint
        let method_ctx = Arc::new(MethodContext {
            store: Arc::clone(&store),
            pending: Arc::clone(&pending),
            bus: Arc::clone(&bus),
            chains: Arc::clone(&chains),
            sse_port: config.sse_port,
            sse_base_url: config.sse_base_url(),
            start_time: chrono::Utc::now(),
            started: Instant::now(),
        });
        let endpoint = StdioEndpoint::new(
            Arc::new(MethodTable::new(method_ctx)),
            Arc::clone(&bus),
            Arc::clone(&shutdown),
        );

        let stdio_handle = tokio::spawn(async move {
            endpoint.run(tokio::io::stdin(), tokio::io::stdout()).await;
        });
        let gateway_handle = tokio::spawn(gateway.serve());

        spawn_idle_sweep(Arc::clone(&store), shutdown.listener());
        spawn_signal_watch(Arc::clone(&shutdown));

        info!(
            run_mode = ?config.run_mode,
            sse_port = config.sse_port,
            wallet_dir = %config.wallet_dir.display(),
            "Algonius wallet host running"
        );

        // Park until any shutdown source fires.
        shutdown.listener().wait().await;
        info!("Shutting down");

        // Reverse teardown: server, stdio, channels, then key material.
        if let Err(e) = tokio::time::timeout(Duration::from_secs(2), gateway_handle).await {
            warn!(error = %e, "Gateway did not stop in time");
        }
        if let Err(e) = tokio::time::timeout(Duration::from_secs(3), stdio_handle).await {
            warn!(error = %e, "Stdio endpoint did not stop in time");
        }
        manager.close_all().await;
        store.lock().await;

        info!("Shutdown complete");
        Ok(())
    }
}

fn build_channels(
    config: &HostConfig,
    chains: &Arc<ChainRouter>,
) -> Vec<Arc<dyn BroadcastChannel>> {
    vec![
        Arc::new(RpcChannel::new(Arc::clone(chains))),
        Arc::new(RelayChannel::new(config.relay.clone(), Arc::clone(chains))),
        Arc::new(BundleChannel::new(config.bundle.clone(), Arc::clone(chains))),
        Arc::new(PaperChannel::new(config.run_mode == RunMode::Test)),
    ]
}

fn spawn_idle_sweep(store: Arc<WalletStore>, mut shutdown: host_types::ShutdownListener) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(IDLE_SWEEP_INTERVAL) => {
                    store.lock_if_idle().await;
                }
            }
        }
    });
}

fn spawn_signal_watch(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!(error = %e, "Cannot install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl-C received");
        }
        shutdown.trigger();
    });
}
