//! # Core Entities
//!
//! ## Clusters
//!
//! - **Submission**: `Action`, `ActionParams`, `Address`
//! - **Durability**: `LedgerStatus`
//! - **Notifications**: `Notification`

use crate::errors::AddressError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// Re-export U256 from primitive-types for value transfers
pub use primitive_types::U256;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Key-value payload carried by a notification.
pub type Payload = Map<String, Value>;

// =============================================================================
// CLUSTER A: SUBMISSION
// =============================================================================

/// A 20-byte account or contract address.
///
/// Serialized as a `0x`-prefixed lowercase hex string, which is what
/// JSON-RPC nodes expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address from the last 20 bytes of a 32-byte word.
    #[must_use]
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A state-changing call to be submitted to the ledger.
///
/// The mapping from a contract method and typed arguments to calldata is
/// produced by an external build step; `calldata` carries the result when
/// one exists. `method` is always set so logs and simulated ledgers can
/// name the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Method name (or contract name for deployments).
    pub method: String,
    /// Target contract. `None` deploys a new contract.
    pub target: Option<Address>,
    /// Pre-encoded calldata or deployment bytecode.
    #[serde(default, with = "hex_bytes")]
    pub calldata: Vec<u8>,
}

impl Action {
    /// Call `method` on an existing contract.
    pub fn call(target: Address, method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: Some(target),
            calldata: Vec::new(),
        }
    }

    /// Deploy the contract named `contract`.
    pub fn deploy(contract: impl Into<String>) -> Self {
        Self {
            method: contract.into(),
            target: None,
            calldata: Vec::new(),
        }
    }

    /// Attach pre-encoded calldata (or bytecode for deployments).
    #[must_use]
    pub fn with_calldata(mut self, calldata: Vec<u8>) -> Self {
        self.calldata = calldata;
        self
    }

    /// Whether this action creates a contract.
    #[must_use]
    pub fn is_deployment(&self) -> bool {
        self.target.is_none()
    }
}

/// Parameters that accompany an [`Action`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Method arguments as JSON values.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Value transferred with the call, in wei.
    #[serde(default)]
    pub value: U256,
    /// Gas limit override.
    pub gas_limit: Option<u64>,
    /// Sender account. `None` lets the ledger pick its default account.
    pub from: Option<Address>,
    /// Idempotency key forwarded to ledgers that understand one.
    ///
    /// Resubmitting without a key the ledger understands may duplicate the
    /// state change.
    pub idempotency_key: Option<String>,
}

impl ActionParams {
    /// Empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set the transferred value.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the gas limit.
    #[must_use]
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

// =============================================================================
// CLUSTER B: DURABILITY
// =============================================================================

/// Durability report for one submitted request, as supplied by the ledger.
///
/// `confirmations` is a monotonically increasing counter owned by the
/// ledger; clients never compute it. Whether the inclusion block counts is
/// up to the ledger adapter, see `LedgerGateway::get_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatus {
    /// The request has been included in the ledger.
    pub included: bool,
    /// Confirmations accumulated since inclusion.
    pub confirmations: u64,
    /// The ledger rejected the action during execution.
    pub reverted: bool,
    /// Rejection reason, when reverted.
    pub reason: Option<String>,
    /// Block the request was included in.
    pub block_number: Option<u64>,
    /// Receipt-like payload (contract address, logs, return data).
    pub payload: Option<Value>,
}

impl LedgerStatus {
    /// Not yet included.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// Included at `block_number` with `confirmations` so far.
    #[must_use]
    pub fn included(block_number: u64, confirmations: u64) -> Self {
        Self {
            included: true,
            confirmations,
            block_number: Some(block_number),
            ..Self::default()
        }
    }

    /// Rejected by the ledger.
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self {
            reverted: true,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Attach a receipt payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

// =============================================================================
// CLUSTER C: NOTIFICATIONS
// =============================================================================

/// An asynchronous message emitted by the ledger on a named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Channel (event) name, e.g. `WinnerPicked`.
    pub channel: String,
    /// Structured payload.
    pub payload: Payload,
    /// Delivery order stamp assigned by the transport. Zero when unknown.
    #[serde(default)]
    pub sequence: u64,
}

impl Notification {
    /// Create a notification on `channel`.
    pub fn new(channel: impl Into<String>, payload: Payload) -> Self {
        Self {
            channel: channel.into(),
            payload,
            sequence: 0,
        }
    }

    /// Stamp the delivery sequence.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Look up a payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Look up a string payload field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_address_display_and_parse() {
        let addr: Address = "0x00000000000000000000000000000000000000aB".parse().unwrap();
        assert_eq!(addr.0[19], 0xab);
        assert_eq!(
            addr.to_string(),
            "0x00000000000000000000000000000000000000ab"
        );
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidLength(2)));
    }

    #[test]
    fn test_address_from_word() {
        let mut word = [0u8; 32];
        word[31] = 7;
        assert_eq!(Address::from_word(&word).0[19], 7);
    }

    #[test]
    fn test_action_serializes_calldata_as_hex() {
        let action = Action::call(Address::ZERO, "store").with_calldata(vec![0x6e, 0x57]);
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["calldata"], json!("0x6e57"));
        assert!(!action.is_deployment());
        assert!(Action::deploy("SimpleStorage").is_deployment());
    }

    #[test]
    fn test_notification_accessors() {
        let mut payload = Payload::new();
        payload.insert("requestId".into(), json!("0x01"));
        let n = Notification::new("WinnerPicked", payload).with_sequence(3);
        assert_eq!(n.get_str("requestId"), Some("0x01"));
        assert_eq!(n.sequence, 3);
        assert!(n.get("missing").is_none());
    }

    #[test]
    fn test_ledger_status_constructors() {
        let status = LedgerStatus::included(10, 0);
        assert!(status.included && !status.reverted);
        let reverted = LedgerStatus::reverted("Raffle__NotOpen");
        assert_eq!(reverted.reason.as_deref(), Some("Raffle__NotOpen"));
    }
}
