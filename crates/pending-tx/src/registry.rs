//! The pending-transaction registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use host_bus::EventBroadcaster;
use host_types::ports::{ChainTxStatus, TransferRequest};
use host_types::{
    normalize_tx_hash, ChainRouter, ChainTag, EventKind, HostError, HostResult,
    PendingTransaction, RejectReason, ShutdownListener, TxKind, TxPriority, TxStatus, WalletEvent,
};
use tx_broadcast::{BroadcastManager, ChannelTxStatus, SubmitParams};
use wallet_store::WalletStore;

use crate::audit::{ActorSurface, AuditLog, AuditRecord};
use crate::entry::Entry;
use crate::MAX_PAGE_SIZE;

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Cadence of confirmation polling per submitted transaction.
    pub poll_interval: Duration,
    /// Channel to try first during fallback, when set.
    pub preferred_channel: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            preferred_channel: None,
        }
    }
}

impl RegistryConfig {
    /// Fast cadence for tests.
    pub fn for_testing() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            preferred_channel: None,
        }
    }
}

/// Input for registering a new pending request.
#[derive(Debug, Clone)]
pub struct NewPendingTx {
    pub chain: ChainTag,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub token: String,
    pub kind: TxKind,
    pub priority: TxPriority,
    pub gas_fee: Option<String>,
    /// Explicit confirmation-threshold override; passes through
    /// unmodified when set.
    pub required_confirmations: Option<u32>,
    /// Message or calldata for signature/contract requests.
    pub payload: Option<serde_json::Value>,
    /// Correlation token echoed in every event about this entry
    /// (used by the extension's `web3_request` conduit).
    pub correlation: Option<String>,
}

impl NewPendingTx {
    pub fn transfer(
        chain: ChainTag,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
            token: token.into(),
            kind: TxKind::Transfer,
            priority: TxPriority::default(),
            gas_fee: None,
            required_confirmations: None,
            payload: None,
            correlation: None,
        }
    }
}

/// Per-identifier result of a batch reject.
#[derive(Debug, Clone, Serialize)]
pub struct RejectOutcome {
    pub id: String,
    pub rejected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Filter + pagination for listings.
#[derive(Debug, Clone, Default)]
pub struct PendingTxFilter {
    pub chain: Option<ChainTag>,
    /// Matches either endpoint of the transaction.
    pub address: Option<String>,
    pub kind: Option<TxKind>,
    /// `None` lists entries in every state.
    pub status: Option<TxStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPage {
    pub transactions: Vec<PendingTransaction>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Pre-submission ID -> wire-hash key, kept after re-keying so
    /// callers holding the old ID still resolve the entry.
    aliases: HashMap<String, String>,
    correlations: HashMap<String, String>,
}

/// Owns all pending-transaction state for the process.
pub struct PendingTxRegistry {
    inner: RwLock<Inner>,
    bus: Arc<EventBroadcaster>,
    audit: Arc<dyn AuditLog>,
    store: Arc<WalletStore>,
    manager: Arc<BroadcastManager>,
    chains: Arc<ChainRouter>,
    config: RegistryConfig,
    shutdown: ShutdownListener,
}

impl PendingTxRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<EventBroadcaster>,
        audit: Arc<dyn AuditLog>,
        store: Arc<WalletStore>,
        manager: Arc<BroadcastManager>,
        chains: Arc<ChainRouter>,
        config: RegistryConfig,
        shutdown: ShutdownListener,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                aliases: HashMap::new(),
                correlations: HashMap::new(),
            }),
            bus,
            audit,
            store,
            manager,
            chains,
            config,
            shutdown,
        })
    }

    /// Park a new request and announce that a decision is needed.
    pub async fn submit(&self, new: NewPendingTx) -> PendingTransaction {
        let id = format!("ptx-{}", Uuid::new_v4());
        let mut tx = PendingTransaction::new(
            id.clone(),
            new.chain,
            new.from,
            new.to,
            new.amount,
            new.token,
            new.kind,
        );
        tx.priority = new.priority;
        if let Some(gas_fee) = new.gas_fee {
            tx.gas_fee = gas_fee;
        }
        if let Some(required) = new.required_confirmations {
            tx.required_confirmations = required;
        } else if let Ok(adapter) = self.chains.get(new.chain) {
            tx.required_confirmations = adapter.required_confirmations();
        }
        tx.payload = new.payload;

        let snapshot = tx.clone();
        {
            let mut inner = self.inner.write().await;
            inner.entries.insert(id.clone(), Entry::new(tx));
            if let Some(correlation) = new.correlation {
                inner.correlations.insert(id.clone(), correlation);
            }
        }

        let kind = if snapshot.kind == TxKind::Signature {
            EventKind::SignatureConfirmationNeeded
        } else {
            EventKind::TransactionConfirmationNeeded
        };
        let mut data = serde_json::json!({
            "id": snapshot.id,
            "from": snapshot.from,
            "to": snapshot.to,
            "amount": snapshot.amount,
            "token": snapshot.token,
            "tx_type": snapshot.kind,
            "priority": snapshot.priority,
            "gas_fee": snapshot.gas_fee,
        });
        self.attach_correlation(&snapshot.id, &mut data).await;
        self.bus
            .broadcast(WalletEvent::new(kind, data).with_chain(snapshot.chain));

        info!(id = snapshot.id.as_str(), kind = %snapshot.kind, "Pending request parked");
        snapshot
    }

    async fn attach_correlation(&self, id: &str, data: &mut serde_json::Value) {
        let inner = self.inner.read().await;
        if let Some(token) = inner.correlations.get(id) {
            data["correlation"] = serde_json::Value::String(token.clone());
        }
    }

    async fn resolve_key(&self, id: &str, chain_hint: Option<ChainTag>) -> Option<String> {
        let inner = self.inner.read().await;
        if inner.entries.contains_key(id) {
            return Some(id.to_string());
        }
        if let Some(target) = inner.aliases.get(id) {
            return Some(target.clone());
        }
        // Accept hashes without the 0x prefix.
        let normalized = normalize_tx_hash(chain_hint.unwrap_or(ChainTag::Ethereum), id);
        if inner.entries.contains_key(&normalized) {
            return Some(normalized);
        }
        inner.aliases.get(&normalized).cloned()
    }

    /// Snapshot of one entry by ID or wire hash.
    pub async fn get(&self, id: &str) -> HostResult<PendingTransaction> {
        let key = self
            .resolve_key(id, None)
            .await
            .ok_or_else(|| HostError::TxNotFound { id: id.to_string() })?;
        let inner = self.inner.read().await;
        inner
            .entries
            .get(&key)
            .map(|e| e.tx.clone())
            .ok_or_else(|| HostError::TxNotFound { id: id.to_string() })
    }

    /// Confirm a parked request: sign, submit through the broadcast
    /// manager, and start confirmation polling.
    ///
    /// On `all_channels_failed` the entry transitions to `failed` and
    /// the error is returned. Any decision on an already-decided entry
    /// returns `already_decided` without mutating it.
    pub async fn confirm(self: &Arc<Self>, id: &str) -> HostResult<PendingTransaction> {
        let key = self
            .resolve_key(id, None)
            .await
            .ok_or_else(|| HostError::TxNotFound { id: id.to_string() })?;

        // Claim the entry so concurrent decisions lose cleanly.
        let tx = {
            let mut inner = self.inner.write().await;
            let entry = inner
                .entries
                .get_mut(&key)
                .ok_or_else(|| HostError::TxNotFound { id: id.to_string() })?;
            entry.begin_confirm()?;
            entry.tx.clone()
        };

        if tx.kind == TxKind::Signature {
            return self.complete_signature(&key, &tx).await;
        }

        let seed = match self.store.unlocked_seed().await {
            Ok(seed) => seed,
            Err(err) => {
                self.release_claim(&key).await;
                return Err(err);
            }
        };
        let address = match self.store.address_for(tx.chain).await {
            Ok(address) => address,
            Err(err) => {
                self.release_claim(&key).await;
                return Err(err);
            }
        };
        let derivation_path = self.store.derivation_path().await.unwrap_or_default();

        let params = SubmitParams {
            chain: tx.chain,
            request: TransferRequest {
                chain: tx.chain,
                from: tx.from.clone(),
                to: tx.to.clone(),
                amount: tx.amount.clone(),
                token: tx.token.clone(),
                data: tx
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("data"))
                    .and_then(|d| d.as_str())
                    .map(str::to_string),
                nonce: tx.nonce,
            },
            address,
            derivation_path,
            seed,
            priority: tx.priority,
        };

        match self
            .manager
            .submit_with_fallback(&params, self.config.preferred_channel.as_deref())
            .await
        {
            Ok(result) => {
                let hash = normalize_tx_hash(tx.chain, &result.signature);
                let snapshot = self.record_submission(&key, &hash, &result.channel).await?;
                self.spawn_confirmation_poller(
                    hash,
                    snapshot.chain,
                    result.channel,
                    snapshot.required_confirmations,
                );
                Ok(snapshot)
            }
            Err(err @ HostError::AllChannelsFailed { .. }) => {
                self.fail_entry(&key, Some(err.to_string())).await;
                Err(err)
            }
            Err(err) => {
                self.release_claim(&key).await;
                Err(err)
            }
        }
    }

    async fn complete_signature(
        self: &Arc<Self>,
        key: &str,
        tx: &PendingTransaction,
    ) -> HostResult<PendingTransaction> {
        let message = tx
            .payload
            .as_ref()
            .and_then(|p| p.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_default();

        let seed = match self.store.unlocked_seed().await {
            Ok(seed) => seed,
            Err(err) => {
                self.release_claim(key).await;
                return Err(err);
            }
        };
        let address = self.store.address_for(tx.chain).await.unwrap_or_default();
        let derivation_path = self.store.derivation_path().await.unwrap_or_default();
        let adapter = self.chains.get(tx.chain)?;

        let handle = host_types::SigningHandle {
            address: &address,
            seed: seed.expose(),
            derivation_path: &derivation_path,
        };
        let signature = match adapter.sign_message(handle, &message).await {
            Ok(signature) => signature,
            Err(err) => {
                self.release_claim(key).await;
                return Err(err);
            }
        };

        let snapshot = {
            let mut inner = self.inner.write().await;
            let entry = inner
                .entries
                .get_mut(key)
                .ok_or_else(|| HostError::TxNotFound { id: key.to_string() })?;
            entry.mark_confirmed(0, None);
            entry.tx.clone()
        };

        let mut data = serde_json::json!({
            "id": snapshot.id,
            "signature": signature,
        });
        self.attach_correlation(key, &mut data).await;
        self.bus.broadcast(
            WalletEvent::new(EventKind::TransactionConfirmed, data).with_chain(snapshot.chain),
        );
        Ok(snapshot)
    }

    async fn release_claim(&self, key: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.abort_confirm();
        }
    }

    async fn record_submission(
        &self,
        key: &str,
        hash: &str,
        channel: &str,
    ) -> HostResult<PendingTransaction> {
        let mut inner = self.inner.write().await;
        let mut entry = inner
            .entries
            .remove(key)
            .ok_or_else(|| HostError::TxNotFound { id: key.to_string() })?;

        entry.abort_confirm();
        entry.channel = Some(channel.to_string());
        entry.tx.id = hash.to_string();
        entry.tx.last_checked = chrono::Utc::now();
        let snapshot = entry.tx.clone();

        // Re-key under the wire hash; the old ID stays resolvable.
        inner.entries.insert(hash.to_string(), entry);
        inner.aliases.insert(key.to_string(), hash.to_string());
        if let Some(token) = inner.correlations.remove(key) {
            inner.correlations.insert(hash.to_string(), token);
        }
        drop(inner);

        let mut data = serde_json::json!({
            "id": key,
            "tx_hash": hash,
            "channel": channel,
            "confirmations": 0,
            "required_confirmations": snapshot.required_confirmations,
        });
        self.attach_correlation(hash, &mut data).await;
        self.bus.broadcast(
            WalletEvent::new(EventKind::TransactionPending, data).with_chain(snapshot.chain),
        );

        info!(
            tx_hash = hash,
            channel = channel,
            "Pending transaction submitted"
        );
        Ok(snapshot)
    }

    async fn fail_entry(&self, key: &str, error: Option<String>) {
        let snapshot = {
            let mut inner = self.inner.write().await;
            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.mark_failed(error.clone());
                    Some(entry.tx.clone())
                }
                None => None,
            }
        };
        if let Some(tx) = snapshot {
            let mut data = serde_json::json!({
                "id": tx.id,
                "error": error,
            });
            self.attach_correlation(&tx.id, &mut data).await;
            self.bus
                .broadcast(WalletEvent::new(EventKind::TransactionFailed, data).with_chain(tx.chain));
            warn!(id = tx.id.as_str(), "Pending transaction failed");
        }
    }

    /// Reject a batch of entries. Per-identifier results; a failure on
    /// one ID never aborts the rest. Each successful reject writes
    /// exactly one audit record.
    pub async fn reject(
        &self,
        ids: &[String],
        reason: RejectReason,
        details: Option<String>,
        actor: ActorSurface,
    ) -> Vec<RejectOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());

        for id in ids {
            let key = match self.resolve_key(id, None).await {
                Some(key) => key,
                None => {
                    outcomes.push(RejectOutcome {
                        id: id.clone(),
                        rejected: false,
                        audit_log_id: None,
                        error: Some(format!("transaction not found: {id}")),
                        error_code: Some("tx_not_found".to_string()),
                    });
                    continue;
                }
            };

            // Single lock held across the decision, including the
            // audit append, so exactly-once bookkeeping cannot race.
            let mut inner = self.inner.write().await;
            let entry = match inner.entries.get_mut(&key) {
                Some(entry) => entry,
                None => {
                    outcomes.push(RejectOutcome {
                        id: id.clone(),
                        rejected: false,
                        audit_log_id: None,
                        error: Some(format!("transaction not found: {id}")),
                        error_code: Some("tx_not_found".to_string()),
                    });
                    continue;
                }
            };

            if let Err(err) = entry.guard_decidable() {
                outcomes.push(RejectOutcome {
                    id: id.clone(),
                    rejected: false,
                    audit_log_id: entry.tx.audit_log_id.clone(),
                    error: Some(err.to_string()),
                    error_code: Some(err.wire_code().to_string()),
                });
                continue;
            }

            let record = AuditRecord::reject(&entry.tx.id, &reason.to_string(), actor);
            let audit_log_id = match self.audit.append(record).await {
                Ok(id) => id,
                Err(err) => {
                    outcomes.push(RejectOutcome {
                        id: id.clone(),
                        rejected: false,
                        audit_log_id: None,
                        error: Some(err.to_string()),
                        error_code: Some(err.wire_code().to_string()),
                    });
                    continue;
                }
            };

            // Guarded above; cannot fail now.
            let _ = entry.mark_rejected(reason, details.clone(), audit_log_id.clone());
            let tx = entry.tx.clone();
            drop(inner);

            let mut data = serde_json::json!({
                "id": tx.id,
                "reason": reason,
                "details": details,
                "audit_log_id": audit_log_id,
            });
            self.attach_correlation(&tx.id, &mut data).await;
            self.bus.broadcast(
                WalletEvent::new(EventKind::TransactionRejected, data).with_chain(tx.chain),
            );

            info!(id = tx.id.as_str(), reason = %reason, "Pending transaction rejected");
            outcomes.push(RejectOutcome {
                id: id.clone(),
                rejected: true,
                audit_log_id: Some(audit_log_id),
                error: None,
                error_code: None,
            });
        }

        outcomes
    }

    /// Filtered, paginated snapshot. Ordering is newest-first by
    /// `submitted_at`, ties broken by identifier.
    pub async fn list(&self, filter: &PendingTxFilter) -> PendingPage {
        let inner = self.inner.read().await;
        let mut matching: Vec<&PendingTransaction> = inner
            .entries
            .values()
            .map(|e| &e.tx)
            .filter(|tx| filter.status.map_or(true, |s| tx.status == s))
            .filter(|tx| filter.chain.map_or(true, |c| tx.chain == c))
            .filter(|tx| filter.kind.map_or(true, |k| tx.kind == k))
            .filter(|tx| {
                filter
                    .address
                    .as_ref()
                    .map_or(true, |a| tx.from.eq_ignore_ascii_case(a) || tx.to.eq_ignore_ascii_case(a))
            })
            .collect();

        matching.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_count = matching.len();
        let limit = filter.limit.unwrap_or(20).min(MAX_PAGE_SIZE);
        let transactions: Vec<PendingTransaction> = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .cloned()
            .collect();
        let has_more = filter.offset + transactions.len() < total_count;

        PendingPage {
            transactions,
            total_count,
            offset: filter.offset,
            limit,
            has_more,
        }
    }

    /// Apply one status poll. Returns true when polling should stop.
    async fn apply_poll(&self, hash: &str, status: &ChannelTxStatus, required: u32) -> bool {
        let (snapshot, event) = {
            let mut inner = self.inner.write().await;
            let entry = match inner.entries.get_mut(hash) {
                Some(entry) => entry,
                None => return true,
            };
            if entry.tx.status.is_terminal() {
                return true;
            }

            match status.status {
                ChainTxStatus::Failed => {
                    entry.mark_failed(status.error.clone());
                    (entry.tx.clone(), Some(EventKind::TransactionFailed))
                }
                _ if status.confirmations >= required
                    || status.status == ChainTxStatus::Confirmed =>
                {
                    entry.mark_confirmed(status.confirmations.max(required), status.slot);
                    (entry.tx.clone(), Some(EventKind::TransactionConfirmed))
                }
                _ => {
                    let advanced = entry.record_confirmations(status.confirmations, status.slot);
                    let event = advanced.then_some(EventKind::TransactionPending);
                    (entry.tx.clone(), event)
                }
            }
        };

        match event {
            Some(EventKind::TransactionFailed) => {
                let mut data = serde_json::json!({
                    "id": snapshot.id,
                    "tx_hash": snapshot.id,
                    "error": snapshot.reject_details,
                });
                self.attach_correlation(&snapshot.id, &mut data).await;
                self.bus.broadcast(
                    WalletEvent::new(EventKind::TransactionFailed, data)
                        .with_chain(snapshot.chain),
                );
                true
            }
            Some(EventKind::TransactionConfirmed) => {
                let mut data = serde_json::json!({
                    "tx_hash": snapshot.id,
                    "from": snapshot.from,
                    "to": snapshot.to,
                    "amount": snapshot.amount,
                    "token": snapshot.token,
                    "confirmations": snapshot.confirmations,
                    "block_number": snapshot.block_number,
                });
                self.attach_correlation(&snapshot.id, &mut data).await;
                self.bus.broadcast(
                    WalletEvent::new(EventKind::TransactionConfirmed, data)
                        .with_chain(snapshot.chain),
                );
                // A confirmed transfer changes the balance on both ends.
                self.bus.broadcast(
                    WalletEvent::new(
                        EventKind::BalanceChanged,
                        serde_json::json!({
                            "address": snapshot.from,
                            "token": snapshot.token,
                        }),
                    )
                    .with_chain(snapshot.chain),
                );
                true
            }
            Some(EventKind::TransactionPending) => {
                // Differential update while confirmations accumulate.
                let data = serde_json::json!({
                    "tx_hash": snapshot.id,
                    "confirmations": snapshot.confirmations,
                    "required_confirmations": snapshot.required_confirmations,
                });
                self.bus.broadcast(
                    WalletEvent::new(EventKind::TransactionPending, data)
                        .with_chain(snapshot.chain),
                );
                false
            }
            _ => false,
        }
    }

    fn spawn_confirmation_poller(
        self: &Arc<Self>,
        hash: String,
        chain: ChainTag,
        channel: String,
        required: u32,
    ) {
        let registry = Arc::clone(self);
        let mut shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            debug!(tx_hash = hash.as_str(), channel = channel.as_str(), "Confirmation poller started");
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(registry.config.poll_interval) => {
                        match registry.manager.status(&channel, chain, &hash).await {
                            Ok(status) => {
                                if registry.apply_poll(&hash, &status, required).await {
                                    break;
                                }
                            }
                            Err(err) => {
                                // Transient; keep polling.
                                debug!(tx_hash = hash.as_str(), error = %err, "Status poll failed");
                            }
                        }
                    }
                }
            }
            debug!(tx_hash = hash.as_str(), "Confirmation poller stopped");
        });
    }
}
