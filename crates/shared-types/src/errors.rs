//! # Error Types
//!
//! Errors raised while parsing shared types.

use thiserror::Error;

/// Errors parsing an [`Address`](crate::Address).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not valid hex.
    #[error("Invalid address hex: {0}")]
    InvalidHex(String),

    /// Decoded to the wrong number of bytes.
    #[error("Invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}
