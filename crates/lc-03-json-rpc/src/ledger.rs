//! `LedgerGateway` over JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the node must hold
//! the sender's key (hardhat/anvil dev accounts, or a signing proxy).

use crate::abi::encode_call;
use crate::rpc::{parse_hex_u64, to_hex_quantity, RpcClient, RpcError};
use async_trait::async_trait;
use lc_01_submit_confirm::{GatewayError, LedgerGateway};
use serde_json::{json, Map, Value};
use shared_types::{Action, ActionParams, Address, LedgerStatus, RequestId};
use tracing::debug;

/// Remote ledger reached over HTTP JSON-RPC.
pub struct JsonRpcLedger {
    client: RpcClient,
    default_sender: Option<Address>,
}

impl JsonRpcLedger {
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            default_sender: None,
        }
    }

    /// Sender used when `ActionParams::from` is unset.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.default_sender = Some(sender);
        self
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        self.client.block_number().await.map_err(map_read_error)
    }

    pub async fn chain_id(&self) -> Result<u64, GatewayError> {
        self.client.chain_id().await.map_err(map_read_error)
    }

    /// Build the transaction object shared by send and call.
    fn transaction(&self, action: &Action, params: &ActionParams) -> Result<Value, GatewayError> {
        let data = calldata(action, params)?;
        let mut tx = Map::new();
        if let Some(from) = params.from.or(self.default_sender) {
            tx.insert("from".into(), json!(from.to_string()));
        }
        if let Some(target) = action.target {
            tx.insert("to".into(), json!(target.to_string()));
        }
        tx.insert("data".into(), json!(format!("0x{}", hex::encode(data))));
        if !params.value.is_zero() {
            tx.insert("value".into(), json!(format!("0x{:x}", params.value)));
        }
        if let Some(gas) = params.gas_limit {
            tx.insert("gas".into(), json!(to_hex_quantity(gas)));
        }
        Ok(Value::Object(tx))
    }
}

/// Explicit calldata wins; otherwise the method is treated as a function
/// signature and `params.args` are encoded against it.
fn calldata(action: &Action, params: &ActionParams) -> Result<Vec<u8>, GatewayError> {
    if !action.calldata.is_empty() {
        return Ok(action.calldata.clone());
    }
    if action.is_deployment() {
        return Err(GatewayError::Rejected(format!(
            "deployment of {} needs bytecode",
            action.method
        )));
    }

    let signature = if action.method.contains('(') {
        action.method.clone()
    } else if params.args.is_empty() {
        format!("{}()", action.method)
    } else {
        return Err(GatewayError::Rejected(format!(
            "{} takes arguments; use a full signature such as {}(uint256)",
            action.method, action.method
        )));
    };
    encode_call(&signature, &params.args).map_err(|e| GatewayError::Rejected(e.to_string()))
}

fn map_transport(err: &reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Protocol(err.to_string())
    } else {
        GatewayError::Unreachable(err.to_string())
    }
}

/// Errors on reads are never rejections.
fn map_read_error(err: RpcError) -> GatewayError {
    match err {
        RpcError::Transport(e) => map_transport(&e),
        other => GatewayError::Protocol(other.to_string()),
    }
}

/// Errors on writes: a node-side error means the action was refused.
fn map_write_error(err: RpcError) -> GatewayError {
    match err {
        RpcError::Transport(e) => map_transport(&e),
        RpcError::Rpc { .. } => {
            GatewayError::Rejected(err.reason().unwrap_or_else(|| err.to_string()))
        }
        other => GatewayError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcLedger {
    async fn submit(
        &self,
        action: &Action,
        params: &ActionParams,
    ) -> Result<RequestId, GatewayError> {
        let tx = self.transaction(action, params)?;
        let hash: String = self
            .client
            .call("eth_sendTransaction", [tx])
            .await
            .map_err(map_write_error)?;
        debug!(tx_hash = %hash, method = %action.method, "Transaction sent");
        Ok(RequestId::new(hash))
    }

    async fn get_status(&self, request_id: &RequestId) -> Result<LedgerStatus, GatewayError> {
        let receipt: Option<Value> = self
            .client
            .call_optional("eth_getTransactionReceipt", [request_id.as_str()])
            .await
            .map_err(map_read_error)?;
        let Some(receipt) = receipt else {
            return Ok(LedgerStatus::pending());
        };

        let included_in = receipt
            .get("blockNumber")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Protocol("receipt without blockNumber".into()))
            .and_then(|b| parse_hex_u64(b).map_err(map_read_error))?;
        let head = self.block_number().await?;
        // Inclusion block counts as the first confirmation.
        let confirmations = head.saturating_sub(included_in) + 1;

        let reverted = receipt.get("status").and_then(Value::as_str) == Some("0x0");
        let mut status = LedgerStatus::included(included_in, confirmations);
        if reverted {
            status.reverted = true;
            status.reason = Some(
                receipt
                    .get("revertReason")
                    .and_then(Value::as_str)
                    .unwrap_or("transaction reverted")
                    .to_string(),
            );
        }
        Ok(status.with_payload(receipt))
    }

    async fn call(&self, action: &Action, params: &ActionParams) -> Result<Value, GatewayError> {
        let tx = self.transaction(action, params)?;
        let result: Value = self
            .client
            .call("eth_call", json!([tx, "latest"]))
            .await
            .map_err(map_write_error)?;
        Ok(result)
    }
}
