//! Host error taxonomy with per-surface wire codes.
//!
//! One surface-agnostic kind per failure mode; the transports map a
//! kind to its wire form at the boundary: a stable string `code` on
//! the agent surface, a numeric JSON-RPC code on stdio.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric JSON-RPC codes used on the stdio surface.
pub mod codes {
    // JSON-RPC 2.0 standard errors
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Wallet-host specific errors (-32000 range)
    pub const INVALID_MNEMONIC_OR_PASSWORD: i32 = -32001;
    pub const WEAK_PASSWORD: i32 = -32002;
    pub const UNSUPPORTED_CHAIN: i32 = -32003;
    pub const WALLET_NOT_FOUND_OR_EXISTS: i32 = -32004;
    pub const STORAGE_ENCRYPTION_FAILED: i32 = -32005;
    pub const TX_NOT_FOUND: i32 = -32010;
    pub const ALREADY_DECIDED: i32 = -32011;
    pub const ALL_CHANNELS_FAILED: i32 = -32012;
    pub const TIMEOUT: i32 = -32013;
}

/// Result alias used across the workspace.
pub type HostResult<T> = Result<T, HostError>;

/// Surface-agnostic error kinds (spec taxonomy).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// Deliberately does not distinguish a missing wallet from a wrong
    /// password or malformed mnemonic.
    #[error("invalid mnemonic or password")]
    InvalidMnemonicOrPassword,

    #[error("password does not meet strength requirements")]
    WeakPassword,

    #[error("unsupported chain: {chain}")]
    UnsupportedChain { chain: String },

    #[error("unsupported token: {token}")]
    UnsupportedToken { token: String },

    #[error("no wallet found")]
    WalletNotFound,

    #[error("a wallet already exists")]
    WalletAlreadyExists,

    #[error("wallet is locked")]
    WalletLocked,

    #[error("storage encryption failed: {message}")]
    StorageEncryptionFailed { message: String },

    /// Internal to the fallback loop; surfaces only if every channel fails.
    #[error("chain rpc failed: {message}")]
    ChainRpcFailed { message: String },

    #[error("all broadcast channels failed")]
    AllChannelsFailed {
        /// Per-channel error strings, in attempt order.
        attempts: Vec<(String, String)>,
    },

    #[error("transaction not found: {id}")]
    TxNotFound { id: String },

    #[error("transaction already decided: {id}")]
    AlreadyDecided { id: String },

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl HostError {
    /// Convenience constructor for parameter validation failures.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        HostError::InvalidParams {
            message: message.into(),
        }
    }

    /// Convenience constructor for internal faults.
    pub fn internal(message: impl Into<String>) -> Self {
        HostError::Internal {
            message: message.into(),
        }
    }

    /// Stable string identifier used as `code` on the agent surface.
    pub fn wire_code(&self) -> &'static str {
        match self {
            HostError::InvalidParams { .. } => "invalid_params",
            HostError::InvalidMnemonicOrPassword => "invalid_mnemonic_or_password",
            HostError::WeakPassword => "weak_password",
            HostError::UnsupportedChain { .. } => "unsupported_chain",
            HostError::UnsupportedToken { .. } => "unsupported_token",
            HostError::WalletNotFound => "wallet_not_found",
            HostError::WalletAlreadyExists => "wallet_already_exists",
            HostError::WalletLocked => "wallet_locked",
            HostError::StorageEncryptionFailed { .. } => "storage_encryption_failed",
            HostError::ChainRpcFailed { .. } => "chain_rpc_failed",
            HostError::AllChannelsFailed { .. } => "all_channels_failed",
            HostError::TxNotFound { .. } => "tx_not_found",
            HostError::AlreadyDecided { .. } => "already_decided",
            HostError::Timeout { .. } => "timeout",
            HostError::MethodNotFound { .. } => "method_not_found",
            HostError::Internal { .. } => "internal_error",
        }
    }

    /// Numeric JSON-RPC code used on the stdio surface.
    pub fn stdio_code(&self) -> i32 {
        match self {
            HostError::InvalidParams { .. } => codes::INVALID_PARAMS,
            HostError::InvalidMnemonicOrPassword => codes::INVALID_MNEMONIC_OR_PASSWORD,
            HostError::WeakPassword => codes::WEAK_PASSWORD,
            HostError::UnsupportedChain { .. } | HostError::UnsupportedToken { .. } => {
                codes::UNSUPPORTED_CHAIN
            }
            HostError::WalletNotFound
            | HostError::WalletAlreadyExists
            | HostError::WalletLocked => codes::WALLET_NOT_FOUND_OR_EXISTS,
            HostError::StorageEncryptionFailed { .. } => codes::STORAGE_ENCRYPTION_FAILED,
            HostError::ChainRpcFailed { .. } => codes::INTERNAL_ERROR,
            HostError::AllChannelsFailed { .. } => codes::ALL_CHANNELS_FAILED,
            HostError::TxNotFound { .. } => codes::TX_NOT_FOUND,
            HostError::AlreadyDecided { .. } => codes::ALREADY_DECIDED,
            HostError::Timeout { .. } => codes::TIMEOUT,
            HostError::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            HostError::Internal { .. } => codes::INTERNAL_ERROR,
        }
    }

    /// Optional hint a caller can act on.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            HostError::InvalidMnemonicOrPassword => {
                Some("verify the password and retry; the wallet stays locked")
            }
            HostError::WeakPassword => Some("use at least 8 characters"),
            HostError::UnsupportedChain { .. } => Some("see the supported_chains resource"),
            HostError::AlreadyDecided { .. } => {
                Some("fetch the entry with get_transactions to reconcile")
            }
            HostError::Timeout { .. } => Some("the operation may be retried"),
            _ => None,
        }
    }

    /// Structured details carried alongside the message, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            HostError::AllChannelsFailed { attempts } => Some(serde_json::json!({
                "channels": attempts
                    .iter()
                    .map(|(name, err)| serde_json::json!({"channel": name, "error": err}))
                    .collect::<Vec<_>>(),
            })),
            _ => None,
        }
    }
}

/// Error object as serialized on either wire:
/// `{code, message, details?, suggestion?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&HostError> for WireError {
    fn from(err: &HostError) -> Self {
        WireError {
            code: err.wire_code().to_string(),
            message: err.to_string(),
            details: err.details(),
            suggestion: err.suggestion().map(str::to_string),
        }
    }
}
