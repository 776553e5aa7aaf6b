//! Adapters for the EventCorrelator ports.

pub mod bus;
