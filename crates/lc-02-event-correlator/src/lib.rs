//! # Event Correlator
//!
//! **Component:** EventCorrelator
//!
//! ## Purpose
//!
//! Lets a caller register interest in a future notification on a named
//! channel ("the next `WinnerPicked` whose `requestId` is X") and suspend
//! until it arrives or a deadline passes.
//!
//! ## Guarantees
//!
//! | Property | Behaviour |
//! |----------|-----------|
//! | Resolution | Exactly once: first matching notification, or timeout, or failure |
//! | Ordering | Notifications are offered to waiters in arrival order |
//! | Replay | None. Notifications emitted before `watch` returns are never seen |
//! | Sharing | One subscription per channel, shared by all of its waiters |
//! | Teardown | The last waiter leaving closes the subscription |
//!
//! Register before triggering: `watch(...).await?` returns only once the
//! subscription is live, so a submit issued afterwards cannot race it.
//!
//! ## Module Structure
//!
//! ```text
//! service.rs           - EventCorrelator (registry + per-channel pump task)
//! handle.rs            - WatchHandle (cancellable future with deadline)
//! ports/inbound.rs     - EventCorrelatorApi
//! ports/outbound.rs    - NotificationSource
//! adapters/bus.rs      - NotificationSource for the in-process bus
//! domain/predicates.rs - predicate builders
//! domain/errors.rs     - CorrelationError
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod handle;
pub mod ports;
pub mod service;

pub use domain::*;
pub use handle::WatchHandle;
pub use ports::*;
pub use service::EventCorrelator;
