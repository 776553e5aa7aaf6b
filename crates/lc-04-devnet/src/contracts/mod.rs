//! Simulated contracts.
//!
//! A contract is a plain state machine. The devnet hands it a
//! [`CallContext`] and the call's JSON arguments and gets back an
//! [`Outcome`]. Value transfer and event publication are done by the devnet
//! from the outcome, so contracts never touch balances directly.

pub mod raffle;
pub mod simple_storage;

pub use raffle::Raffle;
pub use simple_storage::SimpleStorage;

use crate::errors::DevnetError;
use primitive_types::U256;
use serde_json::Value;
use shared_types::{Address, Payload};

/// Environment of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    /// Wei sent with the call.
    pub value: U256,
    /// Contract balance, already including `value`.
    pub balance: U256,
    pub block_number: u64,
    /// Seconds.
    pub timestamp: u64,
    /// Address of the executing contract.
    pub contract: Address,
}

/// An event emitted during execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub event: String,
    pub args: Payload,
}

impl Emitted {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            args: Payload::new(),
        }
    }

    pub fn arg(mut self, name: &str, value: Value) -> Self {
        self.args.insert(name.to_string(), value);
        self
    }
}

/// Result of executing a state-changing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        emitted: Vec<Emitted>,
        /// Wei paid out of the contract balance.
        payouts: Vec<(Address, U256)>,
    },
    Revert(String),
}

impl Outcome {
    pub fn ok() -> Self {
        Self::Success {
            emitted: Vec::new(),
            payouts: Vec::new(),
        }
    }

    pub fn emit(event: Emitted) -> Self {
        Self::Success {
            emitted: vec![event],
            payouts: Vec::new(),
        }
    }

    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Revert(reason.into())
    }
}

/// A contract living on the devnet.
pub trait SimulatedContract: Send + Sync {
    /// Contract type name, e.g. `Raffle`.
    fn name(&self) -> &'static str;

    /// Execute a state-changing method.
    fn execute(&mut self, ctx: &CallContext, method: &str, args: &[Value]) -> Outcome;

    /// Evaluate a read-only method. `Err` carries the revert reason.
    fn query(&self, ctx: &CallContext, method: &str, args: &[Value]) -> Result<Value, String>;

    /// Copy used for dry runs at submission.
    fn snapshot(&self) -> Box<dyn SimulatedContract>;
}

/// Construct a contract by type name with constructor arguments.
pub fn deploy(
    name: &str,
    args: &[Value],
    ctx: &CallContext,
) -> Result<Box<dyn SimulatedContract>, DevnetError> {
    match name {
        "SimpleStorage" => Ok(Box::new(SimpleStorage::new())),
        "Raffle" => Ok(Box::new(Raffle::from_args(args, ctx.timestamp)?)),
        other => Err(DevnetError::UnknownContract(other.to_string())),
    }
}

/// `store(uint256)` → `store`.
pub fn method_name(method: &str) -> &str {
    method.split('(').next().unwrap_or(method).trim()
}

/// Read a uint argument given as a JSON number, decimal string or `0x` hex.
pub fn uint_arg(args: &[Value], index: usize) -> Result<U256, String> {
    let value = args
        .get(index)
        .ok_or_else(|| format!("missing argument {index}"))?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("argument {index} is not an unsigned integer")),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{e:?}")),
            None => U256::from_dec_str(s).map_err(|e| format!("{e:?}")),
        },
        _ => Err(format!("argument {index} is not a number")),
    }
}

pub fn string_arg(args: &[Value], index: usize) -> Result<String, String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("argument {index} is not a string"))
}

/// JSON form of a uint: `0x` hex, as `U256` serializes.
pub fn uint_value(value: U256) -> Value {
    Value::String(format!("0x{value:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_name() {
        assert_eq!(method_name("store(uint256)"), "store");
        assert_eq!(method_name("retrieve"), "retrieve");
    }

    #[test]
    fn test_uint_arg_forms() {
        let args = vec![json!(7), json!("0x10"), json!("1000"), json!(true)];
        assert_eq!(uint_arg(&args, 0).unwrap(), U256::from(7));
        assert_eq!(uint_arg(&args, 1).unwrap(), U256::from(16));
        assert_eq!(uint_arg(&args, 2).unwrap(), U256::from(1000));
        assert!(uint_arg(&args, 3).is_err());
        assert!(uint_arg(&args, 9).is_err());
        assert_eq!(uint_value(U256::from(255)), json!("0xff"));
    }

    #[test]
    fn test_deploy_unknown_contract() {
        let ctx = CallContext {
            sender: Address::ZERO,
            value: U256::zero(),
            balance: U256::zero(),
            block_number: 1,
            timestamp: 0,
            contract: Address::ZERO,
        };
        assert!(deploy("SimpleStorage", &[], &ctx).is_ok());
        assert_eq!(
            deploy("FundMe", &[], &ctx).err(),
            Some(DevnetError::UnknownContract("FundMe".into()))
        );
    }
}
