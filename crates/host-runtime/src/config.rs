//! Host configuration from environment variables with an optional
//! YAML file underneath.
//!
//! Environment always wins; the file (`$WALLET_DIR/config.yaml` or
//! `ALGONIUS_CONFIG`) fills gaps for settings the user wants pinned.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use host_types::{ChainTag, HostError, HostResult};
use tx_broadcast::channels::bundle::BundleConfig;
use tx_broadcast::channels::relay::RelayConfig;

/// Process run mode (`RUN_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Production,
    Development,
    /// Mock broadcast paths: the paper channel is enabled and real
    /// channels may be absent.
    Test,
}

impl FromStr for RunMode {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RunMode::Production),
            "development" | "dev" => Ok(RunMode::Development),
            "test" => Ok(RunMode::Test),
            other => Err(HostError::invalid_params(format!(
                "invalid RUN_MODE: {other}"
            ))),
        }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub run_mode: RunMode,
    /// `LOG_LEVEL`: debug / info / warn / error.
    pub log_level: String,
    /// Dual-transport listener port (`SSE_PORT`).
    pub sse_port: u16,
    /// Wallet store directory (`WALLET_DIR`).
    pub wallet_dir: PathBuf,
    /// Per-chain RPC endpoints (`<CHAIN>_RPC_ENDPOINTS`,
    /// comma-separated).
    pub chain_rpc_endpoints: HashMap<ChainTag, Vec<String>>,
    pub relay: RelayConfig,
    pub bundle: BundleConfig,
    /// Idle auto-lock for the wallet store; `None` disables.
    pub idle_lock_timeout: Option<Duration>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            log_level: "info".to_string(),
            sse_port: agent_gateway::DEFAULT_PORT,
            wallet_dir: default_wallet_dir(),
            chain_rpc_endpoints: HashMap::new(),
            relay: RelayConfig::default(),
            bundle: BundleConfig::default(),
            idle_lock_timeout: Some(Duration::from_secs(15 * 60)),
        }
    }
}

/// Optional YAML file shape; every field may be omitted.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    run_mode: Option<String>,
    log_level: Option<String>,
    sse_port: Option<u16>,
    wallet_dir: Option<PathBuf>,
    #[serde(default)]
    chain_rpc_endpoints: HashMap<String, Vec<String>>,
    idle_lock_secs: Option<u64>,
}

fn default_wallet_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".algonius-wallet")
}

impl HostConfig {
    /// Load from the environment, with the YAML file as fallback.
    pub fn load() -> HostResult<Self> {
        let mut config = Self::default();

        // File layer first, so env can override every field.
        if let Some(file) = Self::read_file()? {
            config.apply_file(file)?;
        }
        config.apply_env()?;

        Ok(config)
    }

    fn read_file() -> HostResult<Option<FileConfig>> {
        let explicit = std::env::var("ALGONIUS_CONFIG").ok().map(PathBuf::from);
        let path = match explicit {
            Some(path) => path,
            None => {
                let dir = std::env::var("WALLET_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_wallet_dir());
                let candidate = dir.join("config.yaml");
                if !candidate.exists() {
                    return Ok(None);
                }
                candidate
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| {
            HostError::invalid_params(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let file: FileConfig = serde_yaml::from_str(&raw)
            .map_err(|e| HostError::invalid_params(format!("config file malformed: {e}")))?;
        Ok(Some(file))
    }

    fn apply_file(&mut self, file: FileConfig) -> HostResult<()> {
        if let Some(mode) = file.run_mode {
            self.run_mode = mode.parse()?;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(port) = file.sse_port {
            self.sse_port = port;
        }
        if let Some(dir) = file.wallet_dir {
            self.wallet_dir = dir;
        }
        for (chain, endpoints) in file.chain_rpc_endpoints {
            self.chain_rpc_endpoints
                .insert(chain.parse()?, endpoints);
        }
        if let Some(secs) = file.idle_lock_secs {
            self.idle_lock_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(())
    }

    fn apply_env(&mut self) -> HostResult<()> {
        if let Ok(mode) = std::env::var("RUN_MODE") {
            self.run_mode = mode.parse()?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(port) = std::env::var("SSE_PORT") {
            self.sse_port = port
                .parse()
                .map_err(|_| HostError::invalid_params("invalid SSE_PORT"))?;
        }
        if let Ok(dir) = std::env::var("WALLET_DIR") {
            self.wallet_dir = PathBuf::from(dir);
        }

        for chain in ChainTag::ALL {
            let key = format!("{}_RPC_ENDPOINTS", chain.as_str().to_ascii_uppercase());
            if let Ok(raw) = std::env::var(&key) {
                let endpoints: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if !endpoints.is_empty() {
                    self.chain_rpc_endpoints.insert(chain, endpoints);
                }
            }
        }

        self.relay = RelayConfig {
            endpoint: std::env::var("RELAY_ENDPOINT").unwrap_or_default(),
            api_key: std::env::var("RELAY_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("RELAY_API_SECRET").unwrap_or_default(),
            passphrase: std::env::var("RELAY_PASSPHRASE").unwrap_or_default(),
        };
        self.bundle = BundleConfig {
            endpoint: std::env::var("BUNDLE_ENDPOINT").unwrap_or_default(),
            api_key: std::env::var("BUNDLE_API_KEY").unwrap_or_default(),
        };

        Ok(())
    }

    /// Base URL agents use to reach the dual-transport server.
    pub fn sse_base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.sse_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("production".parse::<RunMode>().unwrap(), RunMode::Production);
        assert_eq!("DEV".parse::<RunMode>().unwrap(), RunMode::Development);
        assert_eq!("test".parse::<RunMode>().unwrap(), RunMode::Test);
        assert!("staging".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.sse_port, 9444);
        assert_eq!(config.log_level, "info");
        assert!(config.wallet_dir.ends_with(".algonius-wallet"));
        assert!(config.idle_lock_timeout.is_some());
    }

    #[test]
    fn test_yaml_layer() {
        let raw = r#"
run_mode: test
sse_port: 9999
chain_rpc_endpoints:
  ethereum:
    - https://rpc.example/eth
  bsc:
    - https://rpc.example/bsc
idle_lock_secs: 0
"#;
        let file: FileConfig = serde_yaml::from_str(raw).unwrap();
        let mut config = HostConfig::default();
        config.apply_file(file).unwrap();

        assert_eq!(config.run_mode, RunMode::Test);
        assert_eq!(config.sse_port, 9999);
        assert_eq!(
            config.chain_rpc_endpoints[&ChainTag::Ethereum],
            vec!["https://rpc.example/eth"]
        );
        // 0 disables the idle lock.
        assert!(config.idle_lock_timeout.is_none());
    }

    #[test]
    fn test_sse_base_url() {
        let config = HostConfig::default();
        assert_eq!(config.sse_base_url(), "http://127.0.0.1:9444");
    }
}
