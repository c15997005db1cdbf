//! In-memory secret wrapper that zeroizes on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// The wallet's seed bytes while unlocked.
///
/// Zeroed when dropped so locked wallets leave nothing in memory.
/// Never printed: `Debug` is redacted and there is no `Serialize`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretSeed {
    inner: Vec<u8>,
}

impl SecretSeed {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    /// Borrow the seed for a signing call. Callers must not retain
    /// the slice beyond the call.
    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed(***)")
    }
}
