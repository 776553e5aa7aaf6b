//! Ports for SubmitAndConfirm.

pub mod inbound;
pub mod outbound;

pub use inbound::SubmitAndConfirmApi;
pub use outbound::{GatewayError, LedgerGateway, SystemTimeSource, TimeSource};
