//! # Ledger Runtime Library
//!
//! Wires the confirmation protocol and the event correlator to a ledger
//! backend and exposes the lesson scripts. The `ledger-runtime` binary in
//! `main.rs` is a thin CLI over this crate.
//!
//! ## Modules
//!
//! - `config/` - Network presets, `LC_*` environment overrides, validation
//! - `context/` - [`LedgerContext`]: one explicit handle instead of a global
//!   provider and wallet
//! - `scripts/` - block number, deploy, send, watch, register-before-submit
//!   correlation, raffle round

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod context;
pub mod errors;
pub mod scripts;

pub use config::{ConfigError, Network, RuntimeConfig};
pub use context::{Backend, LedgerContext};
pub use errors::ScriptError;
