//! # Devnet - In-Process Development Ledger
//!
//! A single-node chain that lives inside the test or script process. It
//! implements both ledger ports, so the confirmation protocol runs against
//! it exactly as it would against a remote node:
//!
//! - `LedgerGateway`: submit, status (confirmations = blocks mined after
//!   inclusion), read-only calls.
//! - `NotificationSource`: contract events published on the in-process bus
//!   when their block is mined.
//!
//! Controls mirror a local development node: `mine(n)`, `increase_time`,
//! automine on/off, optional interval mining, and a reachability switch for
//! connectivity-failure tests.
//!
//! ## Transaction outcomes
//!
//! | Outcome | When | Surface |
//! |---------|------|---------|
//! | Rejected | Dry run at submit fails (no explicit gas limit) | `GatewayError::Rejected` |
//! | Reverted | Execution at inclusion fails | status `reverted` with reason |
//! | Success | Execution succeeds | events published in emission order |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod chain;
pub mod config;
pub mod contracts;
pub mod errors;

pub use chain::Devnet;
pub use config::DevnetConfig;
pub use contracts::{CallContext, Emitted, Outcome, SimulatedContract};
pub use errors::DevnetError;
