mod frame;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use frame::{FrameRow, IndicatorFrame};

/// Wrapped SOL mint; native SOL balances are read as lamports
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// A tradeable asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Asset {
    pub mint: String,
    pub symbol: String,
}

impl Asset {
    pub fn new(mint: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            symbol: symbol.into(),
        }
    }
}

/// A traded pair: secondary asset quoted in the primary asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetPair {
    pub base: Asset,
    pub quote: Asset,
}

impl AssetPair {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// Stable key used for file names and the position book, e.g. `SOL_USDC`
    pub fn key(&self) -> String {
        format!("{}_{}", self.base.symbol, self.quote.symbol)
    }
}

/// OHLC candlestick for a fixed aggregation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Aggregator quote for a prospective swap
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64,
    /// Raw quote payload; the swap endpoint needs it verbatim
    pub route: serde_json::Value,
}

/// Unsigned transaction returned by the aggregator
#[derive(Debug, Clone)]
pub struct UnsignedSwap {
    pub transaction: Vec<u8>,
    pub last_valid_block_height: Option<u64>,
}

/// On-chain settlement state of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Success,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SwapStatus {
    Pending,
    Confirmed,
    Failed,
}

/// One swap attempt. Never reused: a retry builds a fresh order with a fresh quote.
#[derive(Debug, Clone)]
pub struct SwapOrder {
    pub id: Uuid,
    pub input_mint: String,
    pub output_mint: String,
    pub input_amount: u64,
    pub quote: Option<Quote>,
    pub signed_transaction: Option<Vec<u8>>,
    pub signature: Option<String>,
    pub status: SwapStatus,
}

impl SwapOrder {
    pub fn new(input_mint: &str, output_mint: &str, input_amount: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            input_amount,
            quote: None,
            signed_transaction: None,
            signature: None,
            status: SwapStatus::Pending,
        }
    }
}
