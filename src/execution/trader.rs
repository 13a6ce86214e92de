use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ChainRpc, MarketData, SwapAggregator};
use crate::config::BotConfig;
use crate::execution::balances::timed;
use crate::execution::{
    BalanceOracle, ExecutionAction, Executor, ExitReason, PositionBook, SwapEngine, SwapOutcome,
};
use crate::logging::TRADE_TARGET;
use crate::models::AssetPair;
use crate::persistence::{merge, CandleStore};
use crate::scheduler::PollCycle;
use crate::strategy::{EntryLevels, RiskParams, Strategy, StrategyRegistry};
use crate::wallet::TransactionSigner;
use crate::Result;

/// External services the trader talks to
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketData>,
    pub aggregator: Arc<dyn SwapAggregator>,
    pub rpc: Arc<dyn ChainRpc>,
    pub signer: Arc<dyn TransactionSigner>,
}

/// What happened to one pair during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Bought,
    Sold(ExitReason),
    SwapFailed,
    Skipped(String),
    /// Data was unavailable; the pair is retried next cycle
    Aborted(String),
}

impl fmt::Display for PairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairOutcome::Bought => write!(f, "bought"),
            PairOutcome::Sold(reason) => write!(f, "sold ({})", reason),
            PairOutcome::SwapFailed => write!(f, "swap failed"),
            PairOutcome::Skipped(reason) => write!(f, "{}", reason),
            PairOutcome::Aborted(error) => write!(f, "aborted: {}", error),
        }
    }
}

/// Runs the per-pair analysis and trade cycle
pub struct Trader {
    pairs: Vec<AssetPair>,
    interval_minutes: u32,
    candle_limit: usize,
    max_frame_rows: usize,
    request_timeout: Duration,
    market: Arc<dyn MarketData>,
    oracle: BalanceOracle,
    store: CandleStore,
    book: PositionBook,
    strategy: Box<dyn Strategy>,
    risk: RiskParams,
    executor: Executor,
    engine: SwapEngine,
}

impl Trader {
    /// Build with the strategy named in the configuration
    pub fn new(config: &BotConfig, collaborators: Collaborators) -> Result<Self> {
        let strategy = StrategyRegistry::with_builtin()
            .create(&config.strategy)
            .ok_or_else(|| format!("Unknown strategy '{}'", config.strategy))?;
        Self::with_strategy(config, collaborators, strategy)
    }

    pub fn with_strategy(
        config: &BotConfig,
        collaborators: Collaborators,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self> {
        let risk = RiskParams::resolve(strategy.as_ref(), &config.risk.to_params());

        let data_dir = Path::new(&config.data_dir);
        let book = PositionBook::load(data_dir.join("positions.json"))?;
        let store = CandleStore::new(data_dir);

        let oracle = BalanceOracle::new(
            collaborators.rpc.clone(),
            collaborators.market.clone(),
            collaborators.signer.address(),
            config.request_timeout(),
        );
        let engine = SwapEngine::new(
            collaborators.aggregator,
            collaborators.rpc,
            collaborators.signer,
            config.max_slippage_bps,
            config.swap.clone(),
            config.request_timeout(),
        );

        tracing::info!(
            "Strategy '{}' (SL: {:?}%, TP: {:?}%, trailing: {:?})",
            strategy.name(),
            risk.stop_loss_pct,
            risk.take_profit_pct,
            risk.trailing
        );

        Ok(Self {
            pairs: config.pairs(),
            interval_minutes: config.trading_interval_minutes,
            candle_limit: config.candle_limit,
            max_frame_rows: config.max_frame_rows,
            request_timeout: config.request_timeout(),
            market: collaborators.market,
            oracle,
            store,
            book,
            strategy,
            risk,
            executor: Executor::new(config.position_size_pct),
            engine,
        })
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    /// One full pass over every pair; returns each pair's outcome
    pub async fn run_once(&mut self) -> Vec<(String, PairOutcome)> {
        self.oracle.begin_cycle();

        let mut outcomes = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.clone() {
            let outcome = match self.process_pair(&pair).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("{}: data unavailable, skipping this cycle: {}", pair.key(), e);
                    PairOutcome::Aborted(e.to_string())
                }
            };
            outcomes.push((pair.key(), outcome));
        }

        self.log_summary(&outcomes).await;
        outcomes
    }

    async fn process_pair(&mut self, pair: &AssetPair) -> Result<PairOutcome> {
        let key = pair.key();
        let bars = timed(
            self.request_timeout,
            "candle fetch",
            self.market.fetch_candles(
                &pair.base.symbol,
                &pair.quote.symbol,
                self.interval_minutes,
                self.candle_limit,
            ),
        )
        .await?;
        if bars.is_empty() {
            return Err(format!("no bars returned for {}", key).into());
        }

        let existing = match self.store.load(pair) {
            Ok(frame) => frame.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("{}: discarding unreadable frame: {:#}", key, e);
                Default::default()
            }
        };
        let mut frame = merge(&existing, &bars);
        frame.retain_newest(self.max_frame_rows);

        if frame.len() < self.strategy.min_bars_required() {
            tracing::debug!(
                "{}: warming up ({}/{} bars)",
                key,
                frame.len(),
                self.strategy.min_bars_required()
            );
        }
        self.strategy.evaluate(&mut frame);

        if self.book.is_open(&key) {
            if let Err(e) = self.book.advance_trailing(&key, &frame.bars()) {
                tracing::error!("{}: failed to persist trailing stop: {}", key, e);
            }
        }

        let latest = frame.last().cloned().ok_or("empty frame")?;
        let position = self.book.position(&key);

        let primary_balance = if !position.is_open && latest.entry {
            self.oracle.balance(&pair.quote.mint).await?
        } else {
            0.0
        };
        let secondary_balance = if position.is_open {
            self.oracle.balance(&pair.base.mint).await?
        } else {
            0.0
        };

        let decision = self
            .executor
            .decide(&position, &latest, primary_balance, secondary_balance);

        let outcome = match decision.action {
            ExecutionAction::Buy { amount } => {
                tracing::info!(
                    target: TRADE_TARGET,
                    "🟢 {}: {} - spending {:.6} {}",
                    key,
                    decision.reason,
                    amount,
                    pair.quote.symbol
                );
                let raw = self.oracle.to_raw(&pair.quote.mint, amount).await?;
                let swap = self
                    .engine
                    .perform_swap(raw, &pair.quote.mint, &pair.base.mint)
                    .await;

                if let SwapOutcome::Confirmed(receipt) = &swap {
                    let levels = EntryLevels::from_signal_bar(&latest.bar, &self.risk);
                    if let Err(e) = self.book.enter(&key, &levels) {
                        tracing::error!(
                            target: TRADE_TARGET,
                            "{}: bought but failed to record position: {}",
                            key,
                            e
                        );
                    }
                    self.oracle
                        .invalidate(&[pair.quote.mint.as_str(), pair.base.mint.as_str()]);
                    self.log_received(pair, receipt.out_amount, &pair.base.mint, &pair.base.symbol)
                        .await;
                    PairOutcome::Bought
                } else {
                    PairOutcome::SwapFailed
                }
            }
            ExecutionAction::Sell { amount, reason } => {
                tracing::info!(
                    target: TRADE_TARGET,
                    "🔴 {}: {} - selling {:.6} {}",
                    key,
                    decision.reason,
                    amount,
                    pair.base.symbol
                );
                match reason {
                    ExitReason::StopLoss => {
                        tracing::warn!(target: TRADE_TARGET, "🛑 {}: stop-loss reached", key)
                    }
                    ExitReason::TrailingStop => {
                        tracing::info!(target: TRADE_TARGET, "📉 {}: trailing stop reached", key)
                    }
                    ExitReason::TakeProfit => {
                        tracing::info!(target: TRADE_TARGET, "🎯 {}: take-profit reached", key)
                    }
                    ExitReason::StrategyExit => {}
                }

                let raw = self.oracle.to_raw(&pair.base.mint, amount).await?;
                let swap = self
                    .engine
                    .perform_swap(raw, &pair.base.mint, &pair.quote.mint)
                    .await;

                if let SwapOutcome::Confirmed(receipt) = &swap {
                    if let Err(e) = self.book.exit(&key) {
                        tracing::error!(
                            target: TRADE_TARGET,
                            "{}: sold but failed to record exit: {}",
                            key,
                            e
                        );
                    }
                    self.oracle
                        .invalidate(&[pair.quote.mint.as_str(), pair.base.mint.as_str()]);
                    self.log_received(pair, receipt.out_amount, &pair.quote.mint, &pair.quote.symbol)
                        .await;
                    PairOutcome::Sold(reason)
                } else {
                    PairOutcome::SwapFailed
                }
            }
            ExecutionAction::Skip(skip) => {
                if skip.is_blocked_signal() {
                    tracing::warn!(target: TRADE_TARGET, "⚠️  {}: {}", key, decision.reason);
                } else {
                    tracing::debug!("{}: {}", key, decision.reason);
                }
                PairOutcome::Skipped(decision.reason)
            }
        };

        // A failed save must not hide a swap that already went through
        self.book.annotate(&key, &mut frame);
        if let Err(e) = self.store.save(pair, &frame) {
            tracing::error!("{}: failed to persist frame after {}: {}", key, outcome, e);
        }

        Ok(outcome)
    }

    async fn log_received(&mut self, pair: &AssetPair, out_amount: u64, mint: &str, symbol: &str) {
        match self.oracle.to_ui(mint, out_amount).await {
            Ok(amount) => tracing::info!(
                target: TRADE_TARGET,
                "💰 {}: received {:.6} {}",
                pair.key(),
                amount,
                symbol
            ),
            Err(_) => tracing::info!(
                target: TRADE_TARGET,
                "💰 {}: received {} raw units of {}",
                pair.key(),
                out_amount,
                symbol
            ),
        }
    }

    async fn log_summary(&mut self, outcomes: &[(String, PairOutcome)]) {
        tracing::info!("📊 Cycle summary:");
        for (key, outcome) in outcomes {
            tracing::info!("  {}: {}", key, outcome);
        }

        let mut assets = vec![(
            self.pairs.first().map(|p| p.quote.clone()),
            "primary",
        )];
        assets.extend(self.pairs.iter().map(|p| (Some(p.base.clone()), "secondary")));

        for (asset, role) in assets {
            let Some(asset) = asset else { continue };
            let balance = match self.oracle.balance(&asset.mint).await {
                Ok(balance) => balance,
                Err(e) => {
                    tracing::debug!("Balance of {} unavailable: {}", asset.symbol, e);
                    continue;
                }
            };
            match self.oracle.price_usd(&asset.symbol).await {
                Ok(price) => tracing::info!(
                    "  {} {}: {:.6} (${:.2})",
                    role,
                    asset.symbol,
                    balance,
                    balance * price
                ),
                Err(_) => tracing::info!("  {} {}: {:.6}", role, asset.symbol, balance),
            }
        }
    }
}

#[async_trait]
impl PollCycle for Trader {
    async fn run_cycle(&mut self) {
        self.run_once().await;
    }
}
