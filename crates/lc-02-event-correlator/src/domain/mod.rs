//! Domain layer for the EventCorrelator.

pub mod errors;
pub mod predicates;
pub mod stats;

pub use errors::CorrelationError;
pub use predicates::Predicate;
pub use stats::{CorrelatorStats, CorrelatorStatsSnapshot};
