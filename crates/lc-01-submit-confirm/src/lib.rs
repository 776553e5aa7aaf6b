//! # Submit and Confirm
//!
//! **Component:** SubmitAndConfirm
//!
//! ## Purpose
//!
//! Submits a state-mutating action to a remote ledger, hands back a
//! provisional [`PendingRequest`], and suspends the caller until the ledger
//! reports that the request is included with at least the required number
//! of confirmations.
//!
//! ## Protocol
//!
//! ```text
//! submit() ──→ [PENDING] ──get_status()──→ included && confirmations >= N ──→ Confirmed
//!                  │                    └─→ reverted ─────────────────────────→ Reverted
//!                  └── max_wait elapsed (remote action NOT cancelled) ────────→ TimedOut
//! ```
//!
//! | Outcome | Surface | Retried here? |
//! |---------|---------|---------------|
//! | Ledger refuses the submission | `ConfirmError::ActionRejected` | No |
//! | Reverted after submission | `ConfirmationStatus::Reverted` | No |
//! | Ledger unreachable | `ConfirmError::TransientConnectivity` | No (resubmit is not idempotent) |
//! | Local wait budget exceeded | `ConfirmationStatus::TimedOut` | No |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs         - ConfirmationService (polling loop)        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - SubmitAndConfirmApi                        │
//! │  ports/outbound.rs - LedgerGateway, TimeSource                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/entities.rs - PendingRequest, ConfirmationResult        │
//! │  domain/settled.rs  - SettledResults (memoised outcomes)        │
//! │  domain/errors.rs   - ConfirmError                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::{ConfirmConfig, ConfirmationService};
