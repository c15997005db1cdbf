//! # Wallet Store - Encrypted Key Material at Rest
//!
//! The only component in the process that holds key material. The
//! secret seed is encrypted with XChaCha20-Poly1305 under a key
//! derived from the user's password via Argon2id; cleartext exists in
//! memory only while the wallet is unlocked and is zeroed on lock,
//! idle timeout, and shutdown.
//!
//! ## Security Properties
//!
//! - Unlock verifies by successful AEAD decrypt; a wrong password and
//!   a missing wallet are indistinguishable to the caller.
//! - Secret bytes never appear in logs or `Debug` output.
//! - The store file is written with user-only permissions and guarded
//!   by an advisory lock against concurrent host processes.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod crypto;
pub mod secret;
pub mod store;

pub use secret::SecretSeed;
pub use store::{WalletStore, WalletStoreConfig};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Wallet file name inside the store directory.
pub const WALLET_FILE: &str = "wallet.json";
