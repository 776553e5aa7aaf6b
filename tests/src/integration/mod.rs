//! Integration flows across the protocol crates and the devnet.

pub mod fixtures;

mod confirm_flows;
mod correlation_flows;
mod raffle_flow;
