//! Correlation error types.

use crate::ports::outbound::SourceError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a watch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No matching notification before the deadline. Says nothing about
    /// whether the triggering action succeeded.
    #[error("No matching notification on '{channel}' within {waited:?}")]
    CorrelationTimeout { channel: String, waited: Duration },

    /// The notification source could not be reached, or its stream ended
    /// while the waiter was pending.
    #[error("Notification source unavailable: {0}")]
    TransientConnectivity(String),

    /// The waiter's predicate panicked while inspecting a notification. Only
    /// that waiter fails; the channel keeps delivering to the others.
    #[error("Predicate panicked on '{channel}'")]
    PredicatePanicked { channel: String },

    /// The handle was polled after it already resolved.
    #[error("Watch already resolved")]
    AlreadyResolved,
}

impl From<SourceError> for CorrelationError {
    fn from(err: SourceError) -> Self {
        Self::TransientConnectivity(err.to_string())
    }
}

impl CorrelationError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CorrelationTimeout { .. })
    }
}
