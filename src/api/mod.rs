//! External collaborators: market data, swap aggregator and chain RPC.
//!
//! The trading core only talks to these traits; the concrete HTTP clients
//! live in the submodules.

pub mod cryptocompare;
pub mod jupiter;
pub mod rpc;

use async_trait::async_trait;

use crate::models::{Bar, Quote, TxStatus, UnsignedSwap};
use crate::Result;

pub use cryptocompare::CryptoCompareClient;
pub use jupiter::JupiterClient;
pub use rpc::SolanaRpcClient;

/// OHLC and spot price provider
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Bars of `base` quoted in `quote`, oldest first
    async fn fetch_candles(
        &self,
        base_symbol: &str,
        quote_symbol: &str,
        interval_minutes: u32,
        limit: usize,
    ) -> Result<Vec<Bar>>;

    async fn fetch_price_usd(&self, symbol: &str) -> Result<f64>;
}

/// Swap aggregator (quote, then build an unsigned transaction for it)
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    /// `amount` is in raw units of the input mint
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote>;

    async fn build_transaction(
        &self,
        quote: &Quote,
        user_address: &str,
        slippage_bps: u16,
    ) -> Result<UnsignedSwap>;
}

/// Blockchain RPC provider
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Spendable balance of `mint` held by `owner`, in UI units
    async fn get_balance(&self, owner: &str, mint: &str) -> Result<f64>;

    async fn get_decimals(&self, mint: &str) -> Result<u8>;

    async fn get_block_height(&self) -> Result<u64>;

    async fn get_transaction_status(&self, signature: &str) -> Result<TxStatus>;

    /// Submit a signed, serialized transaction; returns its signature
    async fn send_transaction(&self, signed_transaction: &[u8]) -> Result<String>;
}
