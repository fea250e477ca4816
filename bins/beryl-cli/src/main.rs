//! beryl-cli: Command-line wallet for Beryl.
//!
//! Drives the JSON owner API against a node reached over JSON-RPC. Slates
//! are exchanged out of band as slatepack text, read from and written to
//! files or standard streams.

mod node_client;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;

use beryl_core::constants::{COIN, NetworkType};
use beryl_core::traits::NodeClient;
use beryl_wallet::api::{PmmrRange, SlateResult, StrategyPreview, TxsResult};
use beryl_wallet::restore::RestoredLedger;
use beryl_wallet::{ApiResponse, OwnerApi, TxLogEntry, WalletConfig, WalletError};

use crate::node_client::RpcNodeClient;

/// Beryl command-line wallet.
#[derive(Parser)]
#[command(name = "beryl-cli")]
#[command(version, about = "MimbleWimble wallet for Beryl")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Wallet data directory (default: platform data dir).
    #[arg(long, global = true, env = "BERYL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Network: mainnet, testnet or regtest.
    #[arg(long, global = true, env = "BERYL_NETWORK", default_value = "mainnet")]
    network: String,

    /// Node JSON-RPC address (default: localhost on the network's port).
    #[arg(long, global = true, env = "BERYL_NODE")]
    node: Option<String>,

    /// Node request timeout in milliseconds.
    #[arg(long, global = true, env = "BERYL_NODE_TIMEOUT_MS")]
    node_timeout_ms: Option<u64>,

    /// Confirmations before an output is spendable.
    #[arg(long, global = true, env = "BERYL_MIN_CONFIRMATIONS")]
    min_confirmations: Option<u64>,

    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true, env = "BERYL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format: text or json.
    #[arg(long, global = true, env = "BERYL_LOG_FORMAT", default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet, or restore one from a seed phrase.
    Init(InitArgs),
    /// Show the wallet's seed phrase.
    Phrase,
    /// Refresh from the node and show the balance.
    Info,
    /// List the transaction log.
    Txs(TxsArgs),
    /// Preview the fee of each selection strategy for an amount.
    Estimate(AmountArgs),
    /// Start a send; writes the slatepack for the receiver.
    Send(SendArgs),
    /// Sign a received slatepack; writes the response for the sender.
    Receive(ReceiveArgs),
    /// Finalize a response slatepack into a transaction.
    Finalize(FinalizeArgs),
    /// Post a finalized transaction to the node.
    Post(SlateIdArgs),
    /// Cancel a pending transaction and release its outputs.
    Cancel(SlateIdArgs),
    /// Scan the node's output index for owned outputs.
    Scan(ScanArgs),
    /// Decode a slatepack to JSON.
    Decode(InputArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Restore from an existing seed phrase instead of generating one.
    #[arg(long)]
    restore: bool,

    /// Words in a generated phrase (12 or 24).
    #[arg(long, default_value = "24")]
    words: usize,
}

#[derive(Args)]
struct TxsArgs {
    /// Skip the node refresh and show local state only.
    #[arg(long)]
    no_refresh: bool,

    /// Show a single transaction.
    #[arg(long)]
    id: Option<String>,
}

#[derive(Args)]
struct AmountArgs {
    /// Amount in BRL (e.g. 1.25).
    amount: String,
}

#[derive(Args)]
struct SendArgs {
    /// Amount in BRL (e.g. 1.25).
    amount: String,

    /// Coin selection strategy: smallest_first or use_all.
    #[arg(short, long, default_value = "smallest_first")]
    strategy: String,

    /// Write the slatepack here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct InputArgs {
    /// Read the slatepack from this file instead of stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct ReceiveArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Refuse the slate unless it pays exactly this amount in BRL.
    #[arg(long)]
    expect: Option<String>,

    /// Write the response slatepack here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct FinalizeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Post the transaction right after finalizing.
    #[arg(long)]
    post: bool,
}

#[derive(Args)]
struct SlateIdArgs {
    /// Slate id (UUID).
    slate_id: String,
}

#[derive(Args)]
struct ScanArgs {
    /// First block height to scan from.
    #[arg(long, default_value = "0")]
    from_height: u64,

    /// Last block height to scan (default: chain tip).
    #[arg(long)]
    to_height: Option<u64>,

    /// Stop after this many batches; rerun to resume.
    #[arg(long)]
    max_batches: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global.log_level, &cli.global.log_format);

    let config = resolve_config(&cli.global)?;
    let api = OwnerApi::new(Box::new(rpc_node_factory));

    match cli.command {
        Commands::Init(args) => wallet_init(&api, &config, args),
        Commands::Phrase => wallet_phrase(&api, &config),
        Commands::Decode(args) => {
            let slatepack = read_input(args.input.as_ref())?;
            let slate: serde_json::Value = call(api.slatepack_decode(&slatepack))?;
            println!("{}", serde_json::to_string_pretty(&slate)?);
            Ok(())
        }
        command => {
            let password = wallet_password("Wallet password")?;
            let handle: u64 = call(api.open_wallet(&config_json(&config)?, &password))
                .context("Failed to open wallet")?;
            let result = run_with_wallet(&api, handle, command);
            let _ = api.close_wallet(handle);
            result
        }
    }
}

fn run_with_wallet(api: &OwnerApi, handle: u64, command: Commands) -> Result<()> {
    match command {
        Commands::Info => wallet_info(api, handle),
        Commands::Txs(args) => wallet_txs(api, handle, args),
        Commands::Estimate(args) => {
            let amount = parse_amount(&args.amount)?;
            let previews: Vec<StrategyPreview> = call(api.tx_strategies(handle, amount))?;
            for p in previews {
                println!(
                    "{:<16} selected {:>20} BRL  fee {} BRL",
                    format!("{:?}", p.strategy),
                    format_amount(p.total),
                    format_amount(p.fee)
                );
            }
            Ok(())
        }
        Commands::Send(args) => {
            let amount = parse_amount(&args.amount)?;
            let result: SlateResult = call(api.tx_create(handle, amount, &args.strategy))
                .context("Failed to create transaction")?;
            eprintln!("Slate {} created for {} BRL", result.slate_id, format_amount(amount));
            write_output(args.output.as_ref(), &result.slatepack)
        }
        Commands::Receive(args) => {
            let slatepack = read_input(args.input.input.as_ref())?;
            let expected = args.expect.as_deref().map(parse_amount).transpose()?;
            let result: SlateResult = call(api.tx_receive(handle, &slatepack, expected))
                .context("Failed to receive slate")?;
            eprintln!("Slate {} signed; return the response to the sender", result.slate_id);
            write_output(args.output.as_ref(), &result.slatepack)
        }
        Commands::Finalize(args) => {
            let slatepack = read_input(args.input.input.as_ref())?;
            let result: SlateResult =
                call(api.tx_finalize(handle, &slatepack)).context("Failed to finalize slate")?;
            println!("Slate {} finalized", result.slate_id);
            if args.post {
                let _: bool = call(api.tx_post(handle, &result.slate_id.to_string()))
                    .context("Failed to post transaction")?;
                println!("Transaction posted");
            }
            Ok(())
        }
        Commands::Post(args) => {
            let _: bool = call(api.tx_post(handle, &args.slate_id)).context("Failed to post transaction")?;
            println!("Transaction {} posted", args.slate_id);
            Ok(())
        }
        Commands::Cancel(args) => {
            let _: bool = call(api.tx_cancel(handle, &args.slate_id)).context("Failed to cancel transaction")?;
            println!("Transaction {} cancelled", args.slate_id);
            Ok(())
        }
        Commands::Scan(args) => wallet_scan(api, handle, args),
        Commands::Init(_) | Commands::Phrase | Commands::Decode(_) => {
            bail!("command does not need an open wallet")
        }
    }
}

/// Create a wallet from a fresh or supplied phrase.
fn wallet_init(api: &OwnerApi, config: &WalletConfig, args: InitArgs) -> Result<()> {
    let phrase: String = if args.restore {
        rpassword::prompt_password("Seed phrase: ").context("Failed to read seed phrase")?
    } else {
        call(api.seed_new(args.words))?
    };

    let password = prompt_password("Enter wallet password")?;
    let password_confirm = prompt_password("Confirm password")?;
    if password != password_confirm {
        bail!("Passwords do not match");
    }

    let cfg_json = config_json(config)?;
    let _: bool = call(api.wallet_init(&cfg_json, phrase.trim(), &password)).context("Failed to create wallet")?;

    println!("Network: {}", config.network);
    println!("Wallet saved to: {}", config.wallet_data_dir().display());
    if args.restore {
        println!("Scanning the node for owned outputs...");
        let handle: u64 = call(api.open_wallet(&cfg_json, &password))?;
        let result = call::<RestoredLedger>(api.wallet_scan_outputs(handle, 0, None, None));
        let _ = api.close_wallet(handle);
        let restored = result.context("Restore scan failed; run `scan` to retry")?;
        println!(
            "Recovered {} outputs worth {} BRL",
            restored.outputs.len(),
            format_amount(restored.total_value())
        );
    } else {
        println!("\nSEED PHRASE ({} WORDS):", args.words);
        println!("  {phrase}");
        println!("\nWARNING: This seed phrase will NOT be shown again unless you run `phrase`.");
        println!("Anyone with this phrase can spend your funds.");
    }
    Ok(())
}

fn wallet_phrase(api: &OwnerApi, config: &WalletConfig) -> Result<()> {
    let password = wallet_password("Wallet password")?;
    let phrase: String = call(api.wallet_phrase(&config_json(config)?, &password))?;
    println!("{phrase}");
    Ok(())
}

fn wallet_info(api: &OwnerApi, handle: u64) -> Result<()> {
    let result: TxsResult = call(api.txs_get(handle, true))?;
    if !result.refreshed {
        eprintln!("WARNING: node unreachable, showing last known state");
    }
    let b = result.balance;
    println!("Total:                 {} BRL", format_amount(b.total));
    println!("Spendable:             {} BRL", format_amount(b.spendable));
    println!("Awaiting confirmation: {} BRL", format_amount(b.awaiting_confirmation));
    println!("Unconfirmed:           {} BRL", format_amount(b.unconfirmed));
    println!("Locked:                {} BRL", format_amount(b.locked));
    Ok(())
}

fn wallet_txs(api: &OwnerApi, handle: u64, args: TxsArgs) -> Result<()> {
    if let Some(id) = args.id {
        let entry: TxLogEntry = call(api.tx_get(handle, &id))?;
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }
    let result: TxsResult = call(api.txs_get(handle, !args.no_refresh))?;
    if !args.no_refresh && !result.refreshed {
        eprintln!("WARNING: node unreachable, showing last known state");
    }
    for tx in &result.txs {
        println!(
            "{:>4}  {}  {:<8?} {:<9?} {:<16?} {:>20} BRL  fee {}",
            tx.id,
            tx.slate_id,
            tx.direction,
            tx.status,
            tx.stage,
            format_amount(tx.amount),
            format_amount(tx.fee)
        );
    }
    Ok(())
}

fn wallet_scan(api: &OwnerApi, handle: u64, args: ScanArgs) -> Result<()> {
    let range: PmmrRange = call(api.wallet_pmmr_range(handle, args.from_height, args.to_height))?;
    let start = range.first_index.saturating_sub(1);
    let restored: RestoredLedger =
        call(api.wallet_scan_outputs(handle, start, Some(range.last_index), args.max_batches))?;
    println!(
        "Scanned to index {} of {} ({:?}); recovered {} outputs worth {} BRL",
        restored.last_retrieved_index,
        restored.highest_index,
        restored.status,
        restored.outputs.len(),
        format_amount(restored.total_value())
    );
    Ok(())
}

/// Node client factory handed to the owner API.
fn rpc_node_factory(cfg: &WalletConfig) -> Result<Arc<dyn NodeClient>, WalletError> {
    let client = RpcNodeClient::new(&cfg.node_url(), Duration::from_millis(cfg.node_timeout_ms))?;
    Ok(Arc::new(client))
}

/// Unwrap an API response into its typed payload.
fn call<T: DeserializeOwned>(response: ApiResponse) -> Result<T> {
    if !response.success {
        let error: serde_json::Value =
            serde_json::from_str(&response.payload).unwrap_or(serde_json::Value::Null);
        let code = error["code"].as_str().unwrap_or("unknown");
        let message = error["message"].as_str().unwrap_or(&response.payload);
        return Err(anyhow!("{message} [{code}]"));
    }
    serde_json::from_str(&response.payload).context("Malformed API response")
}

/// Flags and `BERYL_*` variables over network defaults.
fn resolve_config(args: &GlobalArgs) -> Result<WalletConfig> {
    let network: NetworkType = args.network.parse().map_err(|e: String| anyhow!(e))?;
    let mut config = WalletConfig::for_network(network);
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(node) = &args.node {
        config.node_api_addr = node.clone();
    }
    if let Some(timeout) = args.node_timeout_ms {
        config.node_timeout_ms = timeout;
    }
    if let Some(min) = args.min_confirmations {
        config.min_confirmations = min;
    }
    Ok(config)
}

fn config_json(config: &WalletConfig) -> Result<String> {
    serde_json::to_string(config).context("Failed to encode config")
}

/// Parse a decimal BRL amount into nanoberyl without going through floats.
fn parse_amount(s: &str) -> Result<u64> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        bail!("Invalid amount: {s}");
    }
    if frac.len() > 9 {
        bail!("Invalid amount: {s} (at most 9 decimal places)");
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().with_context(|| format!("Invalid amount: {s}"))? };
    let frac_nanos: u64 = if frac.is_empty() {
        0
    } else {
        let digits: u64 = frac.parse().with_context(|| format!("Invalid amount: {s}"))?;
        digits * 10u64.pow(9 - frac.len() as u32)
    };
    let amount = whole
        .checked_mul(COIN)
        .and_then(|n| n.checked_add(frac_nanos))
        .ok_or_else(|| anyhow!("Amount too large: {s}"))?;
    if amount == 0 {
        bail!("Amount must be greater than zero");
    }
    Ok(amount)
}

fn format_amount(nanos: u64) -> String {
    format!("{}.{:09}", nanos / COIN, nanos % COIN)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&PathBuf>, contents: &str) -> Result<()> {
    match path {
        Some(p) => {
            std::fs::write(p, contents).with_context(|| format!("Failed to write {}", p.display()))?;
            eprintln!("Slatepack written to {}", p.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}

/// `BERYL_PASSWORD` if set, otherwise an interactive prompt.
fn wallet_password(prompt: &str) -> Result<String> {
    match std::env::var("BERYL_PASSWORD") {
        Ok(pw) => Ok(pw),
        Err(_) => prompt_password(prompt),
    }
}

/// Prompt for a password securely (no echo).
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

/// Initialize tracing with an EnvFilter and optional JSON output.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_handles_decimals() {
        assert_eq!(parse_amount("1").unwrap(), COIN);
        assert_eq!(parse_amount("1.5").unwrap(), 1_500_000_000);
        assert_eq!(parse_amount("0.000000001").unwrap(), 1);
        assert_eq!(parse_amount(".25").unwrap(), 250_000_000);
    }

    #[test]
    fn parse_amount_rejects_bad_input() {
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.0000000001").is_err());
        assert!(parse_amount(".").is_err());
        assert!(parse_amount("18446744074").is_err());
    }

    #[test]
    fn format_amount_pads_fraction() {
        assert_eq!(format_amount(1_500_000_000), "1.500000000");
        assert_eq!(format_amount(8), "0.000000008");
    }

    #[test]
    fn call_surfaces_error_code() {
        let response = ApiResponse {
            success: false,
            payload: r#"{"code":"insufficient_funds","message":"not enough"}"#.into(),
        };
        let err = call::<bool>(response).unwrap_err();
        assert_eq!(err.to_string(), "not enough [insufficient_funds]");
    }

    #[test]
    fn config_flags_override_network_defaults() {
        let args = GlobalArgs {
            data_dir: Some(PathBuf::from("/tmp/beryl")),
            network: "regtest".into(),
            node: Some("10.0.0.1:23413".into()),
            node_timeout_ms: Some(1_000),
            min_confirmations: None,
            log_level: "warn".into(),
            log_format: "text".into(),
        };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.network, NetworkType::Regtest);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/beryl"));
        assert_eq!(cfg.node_url(), "http://10.0.0.1:23413");
        assert_eq!(cfg.node_timeout_ms, 1_000);
    }

    #[test]
    fn cli_parses_send() {
        let cli = Cli::try_parse_from(["beryl-cli", "--network", "testnet", "send", "2.5", "-s", "use_all"]).unwrap();
        assert_eq!(cli.global.network, "testnet");
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.amount, "2.5");
                assert_eq!(args.strategy, "use_all");
            }
            _ => panic!("expected send"),
        }
    }
}
