//! Keccak-256 helpers.
//!
//! Used to derive event topics from event signatures and request handles on
//! the development ledger.

use sha3::{Digest, Keccak256};

/// Keccak-256 of `data`.
#[must_use]
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}

/// Keccak-256 of `data` as a `0x`-prefixed hex string.
#[must_use]
pub fn keccak256_hex(data: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(keccak256(data)))
}
