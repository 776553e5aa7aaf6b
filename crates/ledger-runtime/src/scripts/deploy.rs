//! Deploy a contract and wait the network's confirmations.

use crate::context::LedgerContext;
use crate::errors::ScriptError;
use serde_json::Value;
use shared_types::{Action, ActionParams, Address, RequestId};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract: String,
    pub address: Address,
    pub request_id: RequestId,
    pub block_number: Option<u64>,
    pub confirmations: u64,
}

/// Deploy `contract`. Remote ledgers need `bytecode`; the devnet builds the
/// contract by name and passes `args` to its constructor.
pub async fn deploy(
    ctx: &LedgerContext,
    contract: &str,
    bytecode: Option<Vec<u8>>,
    args: Vec<Value>,
    confirmations: Option<u64>,
) -> Result<Deployment, ScriptError> {
    let mut action = Action::deploy(contract);
    if let Some(code) = bytecode {
        action = action.with_calldata(code);
    }
    let mut params = ActionParams::new().with_args(args);
    if let Some(sender) = ctx.default_sender() {
        params = params.with_from(sender);
    }
    let required = confirmations.unwrap_or(ctx.config().block_confirmations);

    info!(contract, required, "Deploying");
    let result = ctx
        .confirmations()
        .submit_and_confirm(&action, &params, required)
        .await?
        .into_confirmed(ctx.config().max_wait)?;

    let address = result
        .payload_field("contractAddress")
        .and_then(Value::as_str)
        .ok_or_else(|| ScriptError::Unexpected("receipt has no contractAddress".into()))?
        .parse::<Address>()
        .map_err(|e| ScriptError::Unexpected(e.to_string()))?;

    info!(contract, %address, confirmations = result.confirmations, "Deployed");
    Ok(Deployment {
        contract: contract.to_string(),
        address,
        request_id: result.request_id,
        block_number: result.block_number,
        confirmations: result.confirmations,
    })
}

/// Read creation bytecode from a file holding either `0x` hex or a compiler
/// artifact with a `bytecode` field.
pub fn load_bytecode(path: &Path) -> Result<Vec<u8>, ScriptError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ScriptError::Bytecode(format!("{}: {e}", path.display())))?;
    let text = text.trim();

    let hex_text = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(artifact)) => artifact
            .get("bytecode")
            .and_then(|b| b.as_str().or_else(|| b.get("object").and_then(Value::as_str)))
            .ok_or_else(|| ScriptError::Bytecode("artifact has no bytecode field".into()))?
            .to_string(),
        _ => text.to_string(),
    };
    let stripped = hex_text.strip_prefix("0x").unwrap_or(&hex_text);
    if stripped.is_empty() {
        return Err(ScriptError::Bytecode("empty bytecode".into()));
    }
    hex::decode(stripped).map_err(|e| ScriptError::Bytecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, RuntimeConfig};

    #[tokio::test(start_paused = true)]
    async fn test_deploy_on_devnet_waits_confirmations() {
        let ctx = LedgerContext::connect(RuntimeConfig::preset(Network::Devnet))
            .await
            .unwrap();
        let deployment = deploy(&ctx, "SimpleStorage", None, vec![], Some(2)).await.unwrap();

        assert_eq!(deployment.confirmations, 2);
        let devnet = ctx.devnet().unwrap();
        assert_eq!(devnet.contract_name(&deployment.address), Some("SimpleStorage"));
    }

    #[tokio::test]
    async fn test_deploy_unknown_contract_is_rejected() {
        let ctx = LedgerContext::connect(RuntimeConfig::preset(Network::Devnet))
            .await
            .unwrap();
        let err = deploy(&ctx, "FundMe", None, vec![], Some(0)).await.unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Confirm(lc_01_submit_confirm::ConfirmError::ActionRejected { .. })
        ));
    }

    #[test]
    fn test_load_bytecode_forms() {
        let dir = std::env::temp_dir().join(format!("lc-bytecode-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let raw = dir.join("raw.hex");
        std::fs::write(&raw, "0x6080604052\n").unwrap();
        assert_eq!(load_bytecode(&raw).unwrap(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        let artifact = dir.join("Raffle.json");
        std::fs::write(&artifact, r#"{"contractName":"Raffle","bytecode":"0x6080"}"#).unwrap();
        assert_eq!(load_bytecode(&artifact).unwrap(), vec![0x60, 0x80]);

        let empty = dir.join("empty.hex");
        std::fs::write(&empty, "0x").unwrap();
        assert!(load_bytecode(&empty).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
