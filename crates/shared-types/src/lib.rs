//! # Shared Types Crate
//!
//! Types shared by the confirmation protocol (`lc-01`), the event correlator
//! (`lc-02`) and the ledger adapters (`lc-03`, `lc-04`).
//!
//! ## Design Principles
//!
//! - **Opaque request identity**: a [`RequestId`] is whatever handle the
//!   remote ledger returned from `submit`; it is never derived locally.
//! - **Untyped payloads**: notification payloads and receipts are
//!   `serde_json` values. Decoding them against a contract interface is the
//!   caller's concern.

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod ids;

pub use entities::*;
pub use errors::*;
pub use hashing::{keccak256, keccak256_hex};
pub use ids::{RequestId, WaiterId};
