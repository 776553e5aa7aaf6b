//! Ports for the EventCorrelator.

pub mod inbound;
pub mod outbound;

pub use inbound::EventCorrelatorApi;
pub use outbound::{NotificationSource, NotificationStream, SourceError};
