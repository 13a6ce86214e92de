use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use swapbot::api::{ChainRpc, CryptoCompareClient, JupiterClient, SolanaRpcClient};
use swapbot::config::BotConfig;
use swapbot::execution::{Collaborators, Trader};
use swapbot::logging;
use swapbot::scheduler::Scheduler;
use swapbot::wallet::TransactionSigner;
use swapbot::Result;

/// Automated token-swap trading bot for the Jupiter aggregator
#[derive(Parser, Debug)]
#[command(name = "swapbot", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guards = match logging::init(Path::new(logging::LOG_DIR)) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Cannot set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {
            tracing::info!("👋 Swapbot stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    tracing::info!("🚀 Swapbot starting");

    let config = BotConfig::load(&cli.config)?;
    let wallet = Arc::new(config.wallet()?);
    let timeout = config.request_timeout();

    let rpc = Arc::new(SolanaRpcClient::new(&config.rpc_https, timeout)?);
    let market = Arc::new(CryptoCompareClient::new(
        &config.market_data_api,
        &config.api_key,
        timeout,
    )?);
    let aggregator = Arc::new(JupiterClient::with_settings(
        &config.jupiter_api,
        config.jupiter_api_key.clone(),
        config.priority_fee_micro_lamports,
        timeout,
    )?);

    // Unreachable RPC is a startup failure, not a cycle failure
    let primary_balance = rpc
        .get_balance(&wallet.address(), &config.primary_mint)
        .await
        .map_err(|e| format!("RPC endpoint {} unreachable: {}", config.rpc_https, e))?;

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Wallet: {}", wallet.address());
    tracing::info!(
        "  Primary: {} ({:.6} available)",
        config.primary_mint_symbol,
        primary_balance
    );
    for pair in config.pairs() {
        tracing::info!("    - {} ({})", pair.key(), pair.base.mint);
    }
    tracing::info!("  Strategy: {}", config.strategy);
    tracing::info!(
        "  Poll: every {}s, {}m bars, slippage {} bps",
        config.price_update_seconds,
        config.trading_interval_minutes,
        config.max_slippage_bps
    );

    let mut trader = Trader::new(
        &config,
        Collaborators {
            market,
            aggregator,
            rpc,
            signer: wallet,
        },
    )?;

    tracing::info!("\nPress Ctrl+C to stop...\n");

    let scheduler = Scheduler::new(config.price_update_interval());
    scheduler.run(&mut trader, shutdown_signal()).await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("\n⚠️  Received Ctrl+C, finishing current cycle..."),
        Err(e) => {
            tracing::error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
