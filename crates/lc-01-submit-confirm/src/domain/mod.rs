//! Domain layer for SubmitAndConfirm.

pub mod entities;
pub mod errors;
pub mod settled;
pub mod stats;

pub use entities::{ConfirmationResult, ConfirmationStatus, PendingRequest};
pub use errors::ConfirmError;
pub use settled::SettledResults;
pub use stats::{ConfirmStats, ConfirmStatsSnapshot};
