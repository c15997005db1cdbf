//! Chain tags and identifier normalization.
//!
//! Chain names arrive from three surfaces (agent tools, extension RPC,
//! config) in whatever casing the caller prefers; everything folds to
//! one canonical tag before it reaches a registry or adapter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HostError;

/// Canonical tag for a supported chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTag {
    /// Ethereum mainnet and EVM-equivalent testnets.
    Ethereum,
    /// BNB Smart Chain.
    Bsc,
    /// Solana.
    Solana,
}

impl ChainTag {
    /// All tags the host knows about, in display order.
    pub const ALL: [ChainTag; 3] = [ChainTag::Ethereum, ChainTag::Bsc, ChainTag::Solana];

    /// Canonical lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTag::Ethereum => "ethereum",
            ChainTag::Bsc => "bsc",
            ChainTag::Solana => "solana",
        }
    }

    /// Native token symbol for balance displays.
    pub fn native_token(&self) -> &'static str {
        match self {
            ChainTag::Ethereum => "ETH",
            ChainTag::Bsc => "BNB",
            ChainTag::Solana => "SOL",
        }
    }

    /// Default confirmation threshold before a submission is considered
    /// final. Ethereum-family waits 6 blocks, BSC-family 3. Non-EVM
    /// adapters may override via `Chain::required_confirmations`.
    pub fn default_required_confirmations(&self) -> u32 {
        match self {
            ChainTag::Ethereum => 6,
            ChainTag::Bsc => 3,
            ChainTag::Solana => 1,
        }
    }

    /// True for chains that use 0x-prefixed EVM transaction hashes.
    pub fn is_evm(&self) -> bool {
        matches!(self, ChainTag::Ethereum | ChainTag::Bsc)
    }

    /// EVM chain ID for `eth_chainId`; `None` for non-EVM chains.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            ChainTag::Ethereum => Some(1),
            ChainTag::Bsc => Some(56),
            ChainTag::Solana => None,
        }
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainTag {
    type Err = HostError;

    /// Case-folding parse: `"eth"`, `"ETH"`, `"ethereum"`, and
    /// `"Ethereum"` all resolve to the same tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Ok(ChainTag::Ethereum),
            "bsc" | "bnb" | "binance" => Ok(ChainTag::Bsc),
            "sol" | "solana" => Ok(ChainTag::Solana),
            other => Err(HostError::UnsupportedChain {
                chain: other.to_string(),
            }),
        }
    }
}

/// Normalize a transaction hash to its canonical response form.
///
/// EVM hashes are accepted with or without the `0x` prefix and are
/// always returned `0x`-prefixed in lowercase hex. Non-EVM signatures
/// (base58 etc.) pass through untouched.
pub fn normalize_tx_hash(chain: ChainTag, hash: &str) -> String {
    if !chain.is_evm() {
        return hash.to_string();
    }
    let stripped = hash.trim().trim_start_matches("0x").trim_start_matches("0X");
    format!("0x{}", stripped.to_ascii_lowercase())
}
