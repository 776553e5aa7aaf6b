//! JSON-RPC 2.0 client over HTTP.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Errors from [`RpcClient`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// Could not reach the node.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// `result` was absent where one is required.
    #[error("RPC response missing result for {0}")]
    MissingResult(String),

    /// A field could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Revert data or reason carried by an error, if the node sent one.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Rpc { message, data, .. } => Some(
                data.as_ref()
                    .and_then(|d| d.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| message.clone()),
            ),
            _ => None,
        }
    }
}

/// RPC client for an Ethereum-style node.
pub struct RpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a client with a 10 second request timeout.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self::with_timeout(rpc_url, Duration::from_secs(10))
    }

    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    /// Make a JSON-RPC call whose result may legitimately be `null`.
    pub async fn call_optional<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        trace!(method = method, id = id, "RPC request");

        let response: JsonRpcResponse<R> = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(response.result)
    }

    /// Make a JSON-RPC call that must return a result.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| RpcError::MissingResult(method.to_string()))
    }

    /// eth_blockNumber - current block height.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result: String = self.call("eth_blockNumber", Vec::<()>::new()).await?;
        parse_hex_u64(&result)
    }

    /// eth_chainId.
    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let result: String = self.call("eth_chainId", Vec::<()>::new()).await?;
        parse_hex_u64(&result)
    }
}

/// Parse a `0x` quantity.
pub fn parse_hex_u64(s: &str) -> Result<u64, RpcError> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).map_err(|_| RpcError::Malformed(format!("bad quantity '{s}'")))
}

/// Format a `0x` quantity.
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{value:x}")
}
