use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::api::{ChainRpc, MarketData};
use crate::Result;

/// Run a collaborator call under a deadline; an elapsed deadline is an ordinary error
pub(crate) async fn timed<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(limit, call)
        .await
        .map_err(|_| format!("{} timed out after {}s", what, limit.as_secs()))?
}

/// Read-through balance and price cache.
///
/// Balances and prices live for one poll cycle and are dropped per mint
/// after a swap touches them. Decimals never change and are kept for the run.
pub struct BalanceOracle {
    rpc: Arc<dyn ChainRpc>,
    market: Arc<dyn MarketData>,
    owner: String,
    request_timeout: Duration,
    balances: HashMap<String, f64>,
    prices: HashMap<String, f64>,
    decimals: HashMap<String, u8>,
}

impl BalanceOracle {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        market: Arc<dyn MarketData>,
        owner: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            market,
            owner: owner.into(),
            request_timeout,
            balances: HashMap::new(),
            prices: HashMap::new(),
            decimals: HashMap::new(),
        }
    }

    pub fn begin_cycle(&mut self) {
        self.balances.clear();
        self.prices.clear();
    }

    /// Spendable balance of `mint` in UI units
    pub async fn balance(&mut self, mint: &str) -> Result<f64> {
        if let Some(&balance) = self.balances.get(mint) {
            return Ok(balance);
        }

        let balance = timed(
            self.request_timeout,
            "balance lookup",
            self.rpc.get_balance(&self.owner, mint),
        )
        .await?;
        self.balances.insert(mint.to_string(), balance);
        Ok(balance)
    }

    pub async fn decimals(&mut self, mint: &str) -> Result<u8> {
        if let Some(&decimals) = self.decimals.get(mint) {
            return Ok(decimals);
        }

        let decimals = timed(
            self.request_timeout,
            "decimals lookup",
            self.rpc.get_decimals(mint),
        )
        .await?;
        self.decimals.insert(mint.to_string(), decimals);
        Ok(decimals)
    }

    pub async fn price_usd(&mut self, symbol: &str) -> Result<f64> {
        if let Some(&price) = self.prices.get(symbol) {
            return Ok(price);
        }

        let price = timed(
            self.request_timeout,
            "price fetch",
            self.market.fetch_price_usd(symbol),
        )
        .await?;
        self.prices.insert(symbol.to_string(), price);
        Ok(price)
    }

    /// Drop cached balances of exactly the given mints
    pub fn invalidate(&mut self, mints: &[&str]) {
        for mint in mints {
            self.balances.remove(*mint);
        }
    }

    /// UI amount to raw token units, rounded down
    pub async fn to_raw(&mut self, mint: &str, amount: f64) -> Result<u64> {
        let decimals = self.decimals(mint).await?;
        Ok((amount * 10f64.powi(i32::from(decimals))).floor() as u64)
    }

    /// Raw token units to UI amount
    pub async fn to_ui(&mut self, mint: &str, raw: u64) -> Result<f64> {
        let decimals = self.decimals(mint).await?;
        Ok(raw as f64 / 10f64.powi(i32::from(decimals)))
    }
}
