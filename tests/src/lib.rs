//! # Ledger-Confirm Test Suite
//!
//! Cross-crate flows run against the in-process devnet.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs           # Devnet + services wiring
//!     ├── confirm_flows.rs      # submit → await → memo / revert / timeout
//!     ├── correlation_flows.rs  # watch ordering, fan-out, subscription lifecycle
//!     └── raffle_flow.rs        # full round through ledger-runtime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lc-tests
//! cargo test -p lc-tests integration::correlation_flows::
//! ```

pub mod integration;
