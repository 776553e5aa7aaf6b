//! ledger-runtime: run the ledger scripts from the command line.
//!
//! ```text
//! ledger-runtime --network devnet raffle-demo --entrants 3
//! LC_RPC_URL=https://... ledger-runtime --network sepolia block-number
//! ```
//!
//! Exit code 0 on success, 1 on any failure with the error chain printed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use primitive_types::U256;
use serde_json::Value;

use ledger_runtime::scripts::{self, FieldFilter, SendRequest};
use ledger_runtime::{LedgerContext, Network, RuntimeConfig};
use ledger_telemetry::{init_telemetry, HistogramTimer, TelemetryConfig, CONFIRM_DURATION};
use shared_types::Address;

/// Submit actions to a ledger, wait for confirmations and correlate events.
#[derive(Parser, Debug)]
#[command(name = "ledger-runtime")]
#[command(about = "Confirmation and event-correlation scripts for EVM ledgers")]
struct Cli {
    /// Network preset: devnet, localhost, hardhat, sepolia, rinkeby
    #[arg(short, long, default_value = "devnet", env = "LC_NETWORK")]
    network: Network,

    /// Log filter, overrides LC_LOG_LEVEL / RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current block number
    BlockNumber,

    /// Deploy a contract and print its address
    Deploy {
        #[arg(long)]
        contract: String,
        /// Hex bytecode or compiler artifact; required on remote networks
        #[arg(long)]
        bytecode: Option<PathBuf>,
        /// Constructor arguments as a JSON array
        #[arg(long)]
        args: Option<String>,
        #[arg(long)]
        confirmations: Option<u64>,
    },

    /// Submit a call and wait for confirmations
    Send {
        #[arg(long)]
        target: Address,
        #[arg(long)]
        method: String,
        /// Arguments as a JSON array
        #[arg(long)]
        args: Option<String>,
        /// Pre-encoded calldata (hex)
        #[arg(long)]
        data: Option<String>,
        /// Wei to send
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        confirmations: Option<u64>,
        #[arg(long)]
        max_wait_ms: Option<u64>,
    },

    /// Wait for one notification on a channel
    Watch {
        #[arg(long)]
        channel: String,
        #[arg(long, requires = "equals")]
        field: Option<String>,
        #[arg(long, requires = "field")]
        equals: Option<String>,
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,
    },

    /// Run a full raffle round on the in-process devnet
    RaffleDemo {
        #[arg(long, default_value_t = 3)]
        entrants: usize,
    },
}

fn parse_json_args(raw: Option<&str>) -> Result<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(raw).context("--args must be JSON")? {
        Value::Array(args) => Ok(args),
        other => Ok(vec![other]),
    }
}

fn parse_wei(raw: &str) -> Result<U256> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(raw).ok(),
    };
    parsed.with_context(|| format!("--value '{raw}' is not a wei amount"))
}

async fn run(cli: Cli) -> Result<()> {
    let config = RuntimeConfig::from_env(cli.network).context("loading configuration")?;
    let ctx = LedgerContext::connect(config)
        .await
        .with_context(|| format!("connecting to {}", cli.network))?;

    match cli.command {
        Command::BlockNumber => {
            let head = scripts::block_number(&ctx).await?;
            println!("{head}");
        }
        Command::Deploy {
            contract,
            bytecode,
            args,
            confirmations,
        } => {
            let bytecode = bytecode
                .as_deref()
                .map(scripts::load_bytecode)
                .transpose()?;
            let args = parse_json_args(args.as_deref())?;
            let _timer = HistogramTimer::new(&CONFIRM_DURATION);
            let deployment = scripts::deploy(&ctx, &contract, bytecode, args, confirmations)
                .await
                .with_context(|| format!("deploying {contract}"))?;
            println!("{} deployed at {}", deployment.contract, deployment.address);
        }
        Command::Send {
            target,
            method,
            args,
            data,
            value,
            confirmations,
            max_wait_ms,
        } => {
            let mut request = SendRequest::new(target, &method)
                .with_args(parse_json_args(args.as_deref())?);
            if let Some(data) = data {
                let stripped = data.strip_prefix("0x").unwrap_or(&data).to_string();
                request.calldata = Some(hex::decode(stripped).context("--data must be hex")?);
            }
            if let Some(value) = value {
                request = request.with_value(parse_wei(&value)?);
            }
            request.confirmations = confirmations;
            request.max_wait = max_wait_ms.map(Duration::from_millis);

            let max_wait = request.max_wait.or(ctx.config().max_wait);
            let _timer = HistogramTimer::new(&CONFIRM_DURATION);
            let result = scripts::send(&ctx, request)
                .await
                .with_context(|| format!("sending {method}"))?;
            let result = result.into_confirmed(max_wait)?;
            println!(
                "{} confirmed in block {} ({} confirmations)",
                result.request_id,
                result.block_number.unwrap_or_default(),
                result.confirmations
            );
        }
        Command::Watch {
            channel,
            field,
            equals,
            timeout_ms,
        } => {
            let filter = field
                .zip(equals)
                .map(|(field, equals)| FieldFilter { field, equals });
            let notification =
                scripts::watch(&ctx, &channel, filter, Duration::from_millis(timeout_ms))
                    .await
                    .with_context(|| format!("watching {channel}"))?;
            println!("{}", serde_json::to_string_pretty(&notification)?);
        }
        Command::RaffleDemo { entrants } => {
            if cli.network != Network::Devnet {
                bail!("raffle-demo runs on --network devnet only");
            }
            let round = scripts::raffle_demo(&ctx, entrants).await?;
            println!(
                "raffle {} request {} won by {} (pot {} wei)",
                round.raffle, round.request_id, round.winner, round.pot
            );
        }
    }

    if cli.metrics {
        ctx.record_metrics();
        print!("{}", ledger_telemetry::encode_metrics()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry = telemetry.with_log_level(level.as_str());
    }
    if let Err(e) = init_telemetry(&telemetry) {
        eprintln!("Warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
