//! The wallet store: encrypted persistence and unlock lifecycle.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bip39::{Language, Mnemonic};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use host_types::{ChainRouter, ChainTag, HostError, HostResult, WalletStatusInfo};

use crate::crypto::{self, NONCE_LEN, SALT_LEN};
use crate::secret::SecretSeed;
use crate::{MIN_PASSWORD_LEN, WALLET_FILE};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct WalletStoreConfig {
    /// Directory holding the wallet file (default `~/.algonius-wallet`).
    pub dir: PathBuf,
    /// Lock the wallet after this much inactivity. `None` disables.
    pub idle_lock_timeout: Option<Duration>,
}

impl WalletStoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            idle_lock_timeout: Some(Duration::from_secs(15 * 60)),
        }
    }
}

/// On-disk wallet record. The `ciphertext` field holds the encrypted
/// mnemonic phrase; everything else is public metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalletRecord {
    version: u32,
    address: String,
    public_key: String,
    chains: Vec<ChainTag>,
    derivation_path: String,
    salt: String,
    nonce: String,
    ciphertext: String,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

const RECORD_VERSION: u32 = 1;

struct Inner {
    record: Option<WalletRecord>,
    /// BIP39 seed, present only while unlocked.
    seed: Option<SecretSeed>,
    /// Decrypted phrase, kept for export while unlocked.
    mnemonic: Option<SecretSeed>,
    last_activity: Instant,
}

/// Exclusive owner of key material for the process.
pub struct WalletStore {
    config: WalletStoreConfig,
    chains: Arc<ChainRouter>,
    inner: RwLock<Inner>,
    /// Advisory lock against a second host on the same store dir.
    _dir_lock: fs::File,
}

impl WalletStore {
    /// Open (or initialize) the store directory and load wallet
    /// metadata if a wallet exists. Does not unlock anything.
    pub fn open(config: WalletStoreConfig, chains: Arc<ChainRouter>) -> HostResult<Self> {
        fs::create_dir_all(&config.dir).map_err(|e| HostError::StorageEncryptionFailed {
            message: format!("cannot create wallet dir: {e}"),
        })?;
        restrict_dir_permissions(&config.dir)?;

        let lock_path = config.dir.join(".lock");
        let dir_lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| HostError::StorageEncryptionFailed {
                message: format!("cannot open store lock: {e}"),
            })?;
        dir_lock
            .try_lock_exclusive()
            .map_err(|_| HostError::StorageEncryptionFailed {
                message: "wallet store is in use by another host process".to_string(),
            })?;

        let record = Self::read_record(&config.dir)?;
        if record.is_some() {
            debug!(dir = %config.dir.display(), "Existing wallet loaded (locked)");
        }

        Ok(Self {
            config,
            chains,
            inner: RwLock::new(Inner {
                record,
                seed: None,
                mnemonic: None,
                last_activity: Instant::now(),
            }),
            _dir_lock: dir_lock,
        })
    }

    fn read_record(dir: &PathBuf) -> HostResult<Option<WalletRecord>> {
        let path = dir.join(WALLET_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|e| HostError::StorageEncryptionFailed {
            message: format!("cannot read wallet file: {e}"),
        })?;
        let record: WalletRecord =
            serde_json::from_str(&raw).map_err(|e| HostError::StorageEncryptionFailed {
                message: format!("wallet file corrupt: {e}"),
            })?;
        Ok(Some(record))
    }

    fn write_record(&self, record: &WalletRecord) -> HostResult<()> {
        let path = self.config.dir.join(WALLET_FILE);
        let raw =
            serde_json::to_string_pretty(record).map_err(|e| HostError::StorageEncryptionFailed {
                message: format!("cannot serialize wallet: {e}"),
            })?;
        fs::write(&path, raw).map_err(|e| HostError::StorageEncryptionFailed {
            message: format!("cannot write wallet file: {e}"),
        })?;
        restrict_file_permissions(&path)?;
        Ok(())
    }

    /// Create a fresh wallet: generates a mnemonic, encrypts it under
    /// the password, persists, and leaves the wallet unlocked.
    ///
    /// Returns the status plus the mnemonic, surfaced exactly once for
    /// user backup.
    pub async fn create(
        &self,
        password: &str,
        chain: ChainTag,
        derivation_path: &str,
    ) -> HostResult<(WalletStatusInfo, String)> {
        check_password(password)?;
        let mnemonic = Mnemonic::generate_in(Language::English, 12)
            .map_err(|e| HostError::internal(format!("mnemonic generation failed: {e}")))?;
        let phrase = mnemonic.to_string();
        let status = self
            .import_phrase(&phrase, password, chain, derivation_path)
            .await?;
        Ok((status, phrase))
    }

    /// Import an existing mnemonic. Replaces nothing: a second wallet
    /// is rejected with `wallet_already_exists`.
    pub async fn import(
        &self,
        mnemonic: &str,
        password: &str,
        chain: ChainTag,
        derivation_path: &str,
    ) -> HostResult<WalletStatusInfo> {
        check_password(password)?;
        self.import_phrase(mnemonic, password, chain, derivation_path)
            .await
    }

    async fn import_phrase(
        &self,
        phrase: &str,
        password: &str,
        chain: ChainTag,
        derivation_path: &str,
    ) -> HostResult<WalletStatusInfo> {
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
            .map_err(|_| HostError::InvalidMnemonicOrPassword)?;
        let seed_bytes = mnemonic.to_seed("").to_vec();

        let adapter = self.chains.get(chain)?;
        let (address, public_key) = adapter.derive_address(&seed_bytes, derivation_path)?;

        let mut inner = self.inner.write().await;
        if inner.record.is_some() {
            return Err(HostError::WalletAlreadyExists);
        }

        let salt = crypto::generate_salt();
        let (ciphertext, nonce) = crypto::encrypt(password, &salt, phrase.as_bytes())?;

        let now = Utc::now();
        let record = WalletRecord {
            version: RECORD_VERSION,
            address: address.clone(),
            public_key,
            chains: vec![chain],
            derivation_path: derivation_path.to_string(),
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(&ciphertext),
            created_at: now,
            last_used_at: now,
        };
        self.write_record(&record)?;

        inner.record = Some(record);
        inner.seed = Some(SecretSeed::new(seed_bytes));
        inner.mnemonic = Some(SecretSeed::new(phrase.as_bytes().to_vec()));
        inner.last_activity = Instant::now();

        info!(address = address.as_str(), chain = %chain, "Wallet imported");
        Ok(status_of(&inner))
    }

    /// Unlock with the password. Verification is by successful AEAD
    /// decrypt; wrong password and missing wallet are reported the
    /// same way.
    pub async fn unlock(&self, password: &str) -> HostResult<WalletStatusInfo> {
        let mut inner = self.inner.write().await;
        let record = match inner.record.as_ref() {
            Some(r) => r.clone(),
            None => {
                info!("Unlock attempt failed");
                return Err(HostError::InvalidMnemonicOrPassword);
            }
        };

        let salt = decode_fixed::<SALT_LEN>(&record.salt)?;
        let nonce = decode_fixed::<NONCE_LEN>(&record.nonce)?;
        let ciphertext =
            hex::decode(&record.ciphertext).map_err(|e| HostError::StorageEncryptionFailed {
                message: format!("wallet file corrupt: {e}"),
            })?;

        let phrase_bytes = match crypto::decrypt(password, &salt, &nonce, &ciphertext) {
            Ok(p) => p,
            Err(e) => {
                info!("Unlock attempt failed");
                return Err(e);
            }
        };
        let phrase = String::from_utf8(phrase_bytes.clone())
            .map_err(|_| HostError::InvalidMnemonicOrPassword)?;
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &phrase)
            .map_err(|_| HostError::InvalidMnemonicOrPassword)?;

        inner.seed = Some(SecretSeed::new(mnemonic.to_seed("").to_vec()));
        inner.mnemonic = Some(SecretSeed::new(phrase_bytes));
        inner.last_activity = Instant::now();

        if let Some(record) = inner.record.as_mut() {
            record.last_used_at = Utc::now();
        }
        if let Some(record) = inner.record.clone() {
            // Best-effort timestamp refresh; failure to persist it is
            // not an unlock failure.
            if let Err(e) = self.write_record(&record) {
                warn!(error = %e, "Could not persist last_used_at");
            }
        }

        info!("Wallet unlocked");
        Ok(status_of(&inner))
    }

    /// Lock the wallet, zeroing in-memory key material.
    ///
    /// Locking with no wallet loaded is a successful no-op.
    pub async fn lock(&self) -> WalletStatusInfo {
        let mut inner = self.inner.write().await;
        let was_unlocked = inner.seed.is_some();
        inner.seed = None;
        inner.mnemonic = None;
        if was_unlocked {
            info!("Wallet locked");
        }
        status_of(&inner)
    }

    /// Current status snapshot.
    pub async fn status(&self) -> WalletStatusInfo {
        status_of(&*self.inner.read().await)
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.read().await.seed.is_some()
    }

    /// Borrowable copy of the seed for a signing call. The clone
    /// zeroizes on drop. Errors when locked or absent.
    pub async fn unlocked_seed(&self) -> HostResult<SecretSeed> {
        let mut inner = self.inner.write().await;
        inner.last_activity = Instant::now();
        match (&inner.record, &inner.seed) {
            (None, _) => Err(HostError::WalletNotFound),
            (Some(_), None) => Err(HostError::WalletLocked),
            (Some(_), Some(seed)) => Ok(seed.clone()),
        }
    }

    /// The decrypted mnemonic phrase, available only while unlocked.
    #[cfg(feature = "wallet-export")]
    pub async fn export_mnemonic(&self) -> HostResult<String> {
        let inner = self.inner.read().await;
        match (&inner.record, &inner.mnemonic) {
            (None, _) => Err(HostError::WalletNotFound),
            (Some(_), None) => Err(HostError::WalletLocked),
            (Some(_), Some(phrase)) => String::from_utf8(phrase.expose().to_vec())
                .map_err(|_| HostError::internal("stored mnemonic is not utf-8")),
        }
    }

    /// Address for a chain. The primary chain answers even while
    /// locked (it is public metadata); other chains require an unlock
    /// to derive.
    pub async fn address_for(&self, chain: ChainTag) -> HostResult<String> {
        let inner = self.inner.read().await;
        let record = inner.record.as_ref().ok_or(HostError::WalletNotFound)?;
        if record.chains.contains(&chain) {
            return Ok(record.address.clone());
        }
        let seed = inner.seed.as_ref().ok_or(HostError::WalletLocked)?;
        let adapter = self.chains.get(chain)?;
        let (address, _) = adapter.derive_address(seed.expose(), &record.derivation_path)?;
        Ok(address)
    }

    /// Derivation path recorded at import time.
    pub async fn derivation_path(&self) -> HostResult<String> {
        let inner = self.inner.read().await;
        inner
            .record
            .as_ref()
            .map(|r| r.derivation_path.clone())
            .ok_or(HostError::WalletNotFound)
    }

    /// Lock if the idle timeout elapsed. Called by the runtime's
    /// housekeeping task; returns true when a lock happened.
    pub async fn lock_if_idle(&self) -> bool {
        let timeout = match self.config.idle_lock_timeout {
            Some(t) => t,
            None => return false,
        };
        let mut inner = self.inner.write().await;
        if inner.seed.is_some() && inner.last_activity.elapsed() >= timeout {
            inner.seed = None;
            inner.mnemonic = None;
            info!("Wallet auto-locked after idle timeout");
            return true;
        }
        false
    }
}

fn status_of(inner: &Inner) -> WalletStatusInfo {
    match &inner.record {
        None => WalletStatusInfo::absent(),
        Some(record) => WalletStatusInfo {
            has_wallet: true,
            is_unlocked: inner.seed.is_some(),
            address: Some(record.address.clone()),
            public_key: Some(record.public_key.clone()),
            chains: record.chains.clone(),
            created_at: Some(record.created_at),
            last_used_at: Some(record.last_used_at),
        },
    }
}

fn check_password(password: &str) -> HostResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(HostError::WeakPassword);
    }
    Ok(())
}

fn decode_fixed<const N: usize>(hex_str: &str) -> HostResult<[u8; N]> {
    let bytes = hex::decode(hex_str).map_err(|e| HostError::StorageEncryptionFailed {
        message: format!("wallet file corrupt: {e}"),
    })?;
    bytes
        .try_into()
        .map_err(|_| HostError::StorageEncryptionFailed {
            message: "wallet file corrupt: bad field length".to_string(),
        })
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &std::path::Path) -> HostResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
        HostError::StorageEncryptionFailed {
            message: format!("cannot restrict wallet dir: {e}"),
        }
    })
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &std::path::Path) -> HostResult<()> {
    Ok(())
}

#[cfg(unix)]
fn restrict_file_permissions(path: &std::path::Path) -> HostResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        HostError::StorageEncryptionFailed {
            message: format!("cannot restrict wallet file: {e}"),
        }
    })
}

#[cfg(not(unix))]
fn restrict_file_permissions(_path: &std::path::Path) -> HostResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use host_types::ports::{
        Chain, ChainTxStatus, GasEstimate, SignedTransfer, SigningHandle, TransferRequest,
        TxStatusInfo,
    };

    struct TestChain;

    #[async_trait]
    impl Chain for TestChain {
        fn tag(&self) -> ChainTag {
            ChainTag::Ethereum
        }

        fn derive_address(&self, seed: &[u8], _path: &str) -> HostResult<(String, String)> {
            // Deterministic pseudo-address from the seed prefix.
            Ok((
                format!("0x{}", hex::encode(&seed[..20])),
                format!("0x{}", hex::encode(&seed[..33.min(seed.len())])),
            ))
        }

        async fn get_balance(&self, _address: &str, _token: &str) -> HostResult<String> {
            Ok("0".into())
        }

        async fn estimate_gas(&self, _req: &TransferRequest) -> HostResult<GasEstimate> {
            Ok(GasEstimate {
                gas_limit: 21_000,
                gas_price: "1".into(),
            })
        }

        async fn sign_and_submit(
            &self,
            _wallet: SigningHandle<'_>,
            _req: &TransferRequest,
        ) -> HostResult<String> {
            Ok("0x0".into())
        }

        async fn sign_transfer(
            &self,
            _wallet: SigningHandle<'_>,
            _req: &TransferRequest,
        ) -> HostResult<SignedTransfer> {
            Ok(SignedTransfer {
                raw: "0xraw".into(),
                hash: "0x0".into(),
            })
        }

        async fn sign_message(
            &self,
            _wallet: SigningHandle<'_>,
            _message: &str,
        ) -> HostResult<String> {
            Ok("0xsig".into())
        }

        async fn get_tx_status(&self, _signature: &str) -> HostResult<TxStatusInfo> {
            Ok(TxStatusInfo {
                status: ChainTxStatus::Unknown,
                confirmations: 0,
                block_number: None,
                fee: None,
                timestamp: None,
                error: None,
            })
        }

        async fn confirm(&self, signature: &str, _required: u32) -> HostResult<TxStatusInfo> {
            self.get_tx_status(signature).await
        }
    }

    fn test_store(dir: &std::path::Path) -> WalletStore {
        let router = Arc::new(ChainRouter::new());
        router.register(Arc::new(TestChain));
        let mut config = WalletStoreConfig::new(dir);
        config.idle_lock_timeout = None;
        WalletStore::open(config, router).unwrap()
    }

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[tokio::test]
    async fn test_import_unlock_lock_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let status = store
            .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap();
        assert!(status.has_wallet);
        assert!(status.is_unlocked);
        let address = status.address.clone().unwrap();

        let status = store.lock().await;
        assert!(!status.is_unlocked);
        assert!(store.unlocked_seed().await.is_err());

        let status = store.unlock("hunter22pass").await.unwrap();
        assert!(status.is_unlocked);
        assert_eq!(status.address.unwrap(), address);
        assert!(store.unlocked_seed().await.is_ok());
    }

    #[tokio::test]
    async fn test_unlock_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let address = {
            let store = test_store(dir.path());
            let status = store
                .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
                .await
                .unwrap();
            status.address.unwrap()
            // store (and its dir lock) dropped here
        };

        let store = test_store(dir.path());
        let status = store.status().await;
        assert!(status.has_wallet);
        assert!(!status.is_unlocked);

        let status = store.unlock("hunter22pass").await.unwrap();
        assert_eq!(status.address.unwrap(), address);
    }

    #[tokio::test]
    async fn test_wrong_password_indistinct_from_missing_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        // No wallet at all
        let missing = store.unlock("whatever1").await.unwrap_err();

        store
            .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap();
        store.lock().await;
        let wrong = store.unlock("not-the-password").await.unwrap_err();

        assert_eq!(missing, wrong);
        assert_eq!(missing, HostError::InvalidMnemonicOrPassword);
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let err = store
            .import(PHRASE, "short", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap_err();
        assert_eq!(err, HostError::WeakPassword);
    }

    #[tokio::test]
    async fn test_invalid_mnemonic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let err = store
            .import(
                "not a valid mnemonic phrase at all",
                "hunter22pass",
                ChainTag::Ethereum,
                "m/44'/60'/0'/0/0",
            )
            .await
            .unwrap_err();
        assert_eq!(err, HostError::InvalidMnemonicOrPassword);
    }

    #[tokio::test]
    async fn test_second_wallet_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store
            .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap();
        let err = store
            .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap_err();
        assert_eq!(err, HostError::WalletAlreadyExists);
    }

    #[tokio::test]
    async fn test_create_returns_mnemonic_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let (status, phrase) = store
            .create("hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap();
        assert!(status.is_unlocked);
        assert_eq!(phrase.split_whitespace().count(), 12);

        // The generated phrase round-trips through unlock.
        store.lock().await;
        assert!(store.unlock("hunter22pass").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_without_wallet_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let status = store.lock().await;
        assert!(!status.has_wallet);
        assert!(!status.is_unlocked);
    }

    #[tokio::test]
    async fn test_idle_lock() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(ChainRouter::new());
        router.register(Arc::new(TestChain));
        let mut config = WalletStoreConfig::new(dir.path());
        config.idle_lock_timeout = Some(Duration::from_millis(0));
        let store = WalletStore::open(config, router).unwrap();

        store
            .import(PHRASE, "hunter22pass", ChainTag::Ethereum, "m/44'/60'/0'/0/0")
            .await
            .unwrap();
        assert!(store.lock_if_idle().await);
        assert!(!store.is_unlocked().await);
        // Second sweep finds nothing to do.
        assert!(!store.lock_if_idle().await);
    }
}
