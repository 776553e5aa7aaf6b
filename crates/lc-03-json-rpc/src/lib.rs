//! # JSON-RPC Ledger Adapter
//!
//! Connects the confirmation protocol to an Ethereum-style node.
//!
//! | Type | Port | Transport |
//! |------|------|-----------|
//! | [`JsonRpcLedger`] | `LedgerGateway` | HTTP JSON-RPC 2.0 |
//! | [`WsNotificationSource`] | `NotificationSource` | WebSocket `eth_subscribe("logs")` |
//!
//! Channels are event names. [`EventBook`] maps each name to its event
//! signature, whose keccak hash is the log's first topic.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod abi;
pub mod events;
pub mod ledger;
pub mod rpc;
pub mod ws;

pub use abi::{AbiError, EventSignature, ParamKind};
pub use events::EventBook;
pub use ledger::JsonRpcLedger;
pub use rpc::{RpcClient, RpcError};
pub use ws::WsNotificationSource;
