//! Deterministic chain adapter for tests and development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

use host_types::ports::{
    Chain, ChainTxStatus, GasEstimate, SignedTransfer, SigningHandle, TransferRequest,
    TxStatusInfo,
};
use host_types::{ChainTag, HostError, HostResult};

/// Stand-in for the external chain collaborator.
///
/// Addresses derive deterministically from the seed, submissions get
/// random wire hashes, and every status poll advances the simulated
/// confirmation count by one.
pub struct MockChain {
    tag: ChainTag,
    /// Configured RPC endpoints; recorded for `status` surfaces, not
    /// dialed by the mock.
    endpoints: Vec<String>,
    balances: Mutex<HashMap<(String, String), String>>,
    /// wire hash -> polls seen so far
    submissions: Mutex<HashMap<String, u32>>,
}

impl MockChain {
    pub fn new(tag: ChainTag, endpoints: Vec<String>) -> Self {
        Self {
            tag,
            endpoints,
            balances: Mutex::new(HashMap::new()),
            submissions: Mutex::new(HashMap::new()),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Seed a balance for tests.
    pub fn set_balance(&self, address: &str, token: &str, amount: &str) {
        self.balances
            .lock()
            .insert((address.to_string(), token.to_string()), amount.to_string());
    }

    fn fresh_hash(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        if self.tag.is_evm() {
            format!("0x{}", hex::encode(bytes))
        } else {
            hex::encode(bytes)
        }
    }
}

#[async_trait]
impl Chain for MockChain {
    fn tag(&self) -> ChainTag {
        self.tag
    }

    fn derive_address(&self, seed: &[u8], derivation_path: &str) -> HostResult<(String, String)> {
        if seed.len() < 33 {
            return Err(HostError::internal("seed too short for derivation"));
        }
        debug!(chain = %self.tag, path = derivation_path, "Deriving mock address");
        let address = if self.tag.is_evm() {
            format!("0x{}", hex::encode(&seed[..20]))
        } else {
            hex::encode(&seed[..32])
        };
        let public_key = format!("0x{}", hex::encode(&seed[..33]));
        Ok((address, public_key))
    }

    async fn get_balance(&self, address: &str, token: &str) -> HostResult<String> {
        let balance = self
            .balances
            .lock()
            .get(&(address.to_string(), token.to_string()))
            .cloned()
            .unwrap_or_else(|| "10.0".to_string());
        Ok(balance)
    }

    async fn estimate_gas(&self, req: &TransferRequest) -> HostResult<GasEstimate> {
        let gas_limit = if req.data.is_some() { 65_000 } else { 21_000 };
        Ok(GasEstimate {
            gas_limit,
            gas_price: "1000000000".to_string(),
        })
    }

    async fn sign_and_submit(
        &self,
        _wallet: SigningHandle<'_>,
        req: &TransferRequest,
    ) -> HostResult<String> {
        let hash = self.fresh_hash();
        self.submissions.lock().insert(hash.clone(), 0);
        debug!(
            chain = %self.tag,
            to = req.to.as_str(),
            tx_hash = hash.as_str(),
            "Mock submission accepted"
        );
        Ok(hash)
    }

    async fn sign_transfer(
        &self,
        _wallet: SigningHandle<'_>,
        _req: &TransferRequest,
    ) -> HostResult<SignedTransfer> {
        let hash = self.fresh_hash();
        // A relay/bundle submission of this payload behaves like a
        // direct one for status purposes.
        self.submissions.lock().insert(hash.clone(), 0);
        Ok(SignedTransfer {
            raw: format!("0x{}", hex::encode(hash.as_bytes())),
            hash,
        })
    }

    async fn sign_message(&self, wallet: SigningHandle<'_>, message: &str) -> HostResult<String> {
        // Deterministic per (seed, message) so tests can assert it.
        let mut acc: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in wallet.seed.iter().take(8).chain(message.as_bytes()) {
            acc = acc.wrapping_mul(0x100_0000_01b3).wrapping_add(u64::from(*byte));
        }
        Ok(format!("0x{acc:016x}"))
    }

    async fn get_tx_status(&self, signature: &str) -> HostResult<TxStatusInfo> {
        let mut submissions = self.submissions.lock();
        let Some(polls) = submissions.get_mut(signature) else {
            return Ok(TxStatusInfo {
                status: ChainTxStatus::Unknown,
                confirmations: 0,
                block_number: None,
                fee: None,
                timestamp: None,
                error: None,
            });
        };

        *polls += 1;
        let required = self.required_confirmations();
        let confirmations = (*polls).min(required);
        let status = if confirmations >= required {
            ChainTxStatus::Confirmed
        } else {
            ChainTxStatus::Pending
        };
        Ok(TxStatusInfo {
            status,
            confirmations,
            block_number: Some(1_000_000 + u64::from(*polls)),
            fee: Some("0.00021".to_string()),
            timestamp: Some(chrono::Utc::now().timestamp()),
            error: None,
        })
    }

    async fn confirm(&self, signature: &str, required: u32) -> HostResult<TxStatusInfo> {
        // The mock network never stalls: report the threshold met.
        let mut info = self.get_tx_status(signature).await?;
        if info.status != ChainTxStatus::Unknown {
            info.confirmations = info.confirmations.max(required);
            info.status = ChainTxStatus::Confirmed;
        }
        Ok(info)
    }
}
