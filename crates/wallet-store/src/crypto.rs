//! Password-based encryption for the wallet secret.
//!
//! XChaCha20-Poly1305 for the AEAD (192-bit random nonce, safe to
//! generate per write) with the key derived from the password by
//! Argon2id over a per-wallet random salt.

use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use host_types::{HostError, HostResult};

/// Salt length for the KDF.
pub const SALT_LEN: usize = 16;

/// Nonce length for XChaCha20-Poly1305.
pub const NONCE_LEN: usize = 24;

/// Derived symmetric key (256-bit). Zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Derive the encryption key from a password and salt.
///
/// Argon2id with the crate's default parameters (19 MiB memory,
/// t=2, p=1), which clears the memory-hard bar PBKDF2-style counts
/// approximate.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> HostResult<DerivedKey> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| HostError::StorageEncryptionFailed {
            message: format!("key derivation failed: {e}"),
        })?;
    Ok(DerivedKey(key))
}

/// Generate a random KDF salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Encrypt plaintext under the password. Returns (ciphertext, nonce).
pub fn encrypt(
    password: &str,
    salt: &[u8; SALT_LEN],
    plaintext: &[u8],
) -> HostResult<(Vec<u8>, [u8; NONCE_LEN])> {
    let key = derive_key(password, salt)?;
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| HostError::StorageEncryptionFailed {
            message: format!("encryption failed: {e}"),
        })?;

    Ok((ciphertext, nonce))
}

/// Decrypt the secret blob. A failed decrypt means wrong password or
/// tampered data; both collapse to `invalid_mnemonic_or_password`.
pub fn decrypt(
    password: &str,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> HostResult<Vec<u8>> {
    let key = derive_key(password, salt)?;
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| HostError::InvalidMnemonicOrPassword)
}
