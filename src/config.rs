//! Configuration loading and validation

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{Asset, AssetPair};
use crate::strategy::{RiskParams, StrategyRegistry, TrailingParams};
use crate::wallet::Wallet;

/// Startup configuration errors; any of these aborts the process
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("private key is not set")]
    MissingPrivateKey,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("primary asset is not set (primary_mint and primary_mint_symbol are required)")]
    MissingPrimaryAsset,

    #[error("secondary_mints is empty")]
    NoSecondaryAssets,

    #[error("secondary_mints has {mints} entries but secondary_mint_symbols has {symbols}")]
    MismatchedSecondaryAssets { mints: usize, symbols: usize },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("{name} must be between 0 and 100, got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("unknown strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },
}

/// Immutable snapshot of the bot configuration for one run
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub primary_mint: String,
    #[serde(default)]
    pub primary_mint_symbol: String,
    #[serde(default)]
    pub secondary_mints: Vec<String>,
    #[serde(default)]
    pub secondary_mint_symbols: Vec<String>,

    #[serde(default = "default_price_update_seconds")]
    pub price_update_seconds: u64,
    #[serde(default = "default_trading_interval_minutes")]
    pub trading_interval_minutes: u32,
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: u16,
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_rpc_https")]
    pub rpc_https: String,
    #[serde(default = "default_jupiter_api")]
    pub jupiter_api: String,
    #[serde(default = "default_market_data_api")]
    pub market_data_api: String,
    /// Market data API key
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub jupiter_api_key: Option<String>,
    #[serde(default)]
    pub private_key: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Bars requested per fetch
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// Rows kept in a pair's frame file
    #[serde(default = "default_max_frame_rows")]
    pub max_frame_rows: usize,
    /// Share of the primary balance spent on a buy
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,
    /// Compute unit price passed to the aggregator, in micro-lamports
    #[serde(default = "default_priority_fee")]
    pub priority_fee_micro_lamports: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub swap: SwapSettings,
    #[serde(default)]
    pub risk: RiskConfig,
}

/// Retry and confirmation policy of the swap engine
#[derive(Debug, Clone, Deserialize)]
pub struct SwapSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_confirm_checks")]
    pub confirm_checks: u32,
    #[serde(default = "default_confirm_delay_secs")]
    pub confirm_delay_secs: u64,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            confirm_checks: default_confirm_checks(),
            confirm_delay_secs: default_confirm_delay_secs(),
        }
    }
}

/// Fallback risk levels for strategies that do not set their own
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
    #[serde(default)]
    pub trailing_stop_pct: Option<f64>,
    #[serde(default)]
    pub trailing_activation_pct: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: None,
            trailing_stop_pct: None,
            trailing_activation_pct: None,
        }
    }
}

impl RiskConfig {
    /// Trailing stop needs both percentages
    pub fn to_params(&self) -> RiskParams {
        let trailing = match (self.trailing_stop_pct, self.trailing_activation_pct) {
            (Some(trailing_pct), Some(activation_pct)) => Some(TrailingParams {
                trailing_pct,
                activation_pct,
            }),
            _ => None,
        };

        RiskParams {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            trailing,
        }
    }
}

fn default_price_update_seconds() -> u64 {
    60
}

fn default_trading_interval_minutes() -> u32 {
    1
}

fn default_max_slippage_bps() -> u16 {
    50
}

fn default_strategy() -> String {
    "default".to_string()
}

fn default_rpc_https() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_jupiter_api() -> String {
    crate::api::jupiter::JUPITER_SWAP_API.to_string()
}

fn default_market_data_api() -> String {
    crate::api::cryptocompare::CRYPTOCOMPARE_API_BASE.to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_candle_limit() -> usize {
    50
}

fn default_max_frame_rows() -> usize {
    500
}

fn default_position_size_pct() -> f64 {
    100.0
}

fn default_priority_fee() -> u64 {
    crate::api::jupiter::DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_confirm_checks() -> u32 {
    3
}

fn default_confirm_delay_secs() -> u64 {
    35
}

fn default_stop_loss_pct() -> Option<f64> {
    Some(5.0)
}

impl BotConfig {
    /// Load from a JSON file, then apply `SWAPBOT__*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("SWAPBOT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("secondary_mints")
                    .with_list_parse_key("secondary_mint_symbols")
                    .try_parsing(true),
            )
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate(&StrategyRegistry::with_builtin())?;

        Ok(config)
    }

    /// Parse a JSON document without touching the environment
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self, registry: &StrategyRegistry) -> Result<(), ConfigError> {
        self.wallet()?;

        if self.primary_mint.trim().is_empty() || self.primary_mint_symbol.trim().is_empty() {
            return Err(ConfigError::MissingPrimaryAsset);
        }
        if self.secondary_mints.is_empty() {
            return Err(ConfigError::NoSecondaryAssets);
        }
        if self.secondary_mints.len() != self.secondary_mint_symbols.len() {
            return Err(ConfigError::MismatchedSecondaryAssets {
                mints: self.secondary_mints.len(),
                symbols: self.secondary_mint_symbols.len(),
            });
        }

        if self.price_update_seconds == 0 {
            return Err(ConfigError::ZeroValue("price_update_seconds"));
        }
        if self.trading_interval_minutes == 0 {
            return Err(ConfigError::ZeroValue("trading_interval_minutes"));
        }
        if self.candle_limit == 0 {
            return Err(ConfigError::ZeroValue("candle_limit"));
        }
        if self.max_frame_rows == 0 {
            return Err(ConfigError::ZeroValue("max_frame_rows"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("request_timeout_secs"));
        }
        if self.swap.max_attempts == 0 {
            return Err(ConfigError::ZeroValue("swap.max_attempts"));
        }
        if self.swap.confirm_checks == 0 {
            return Err(ConfigError::ZeroValue("swap.confirm_checks"));
        }

        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 100.0) {
            return Err(ConfigError::OutOfRange {
                name: "position_size_pct",
                value: self.position_size_pct,
            });
        }
        if let Some(sl) = self.risk.stop_loss_pct {
            if !(sl > 0.0 && sl < 100.0) {
                return Err(ConfigError::OutOfRange {
                    name: "risk.stop_loss_pct",
                    value: sl,
                });
            }
        }

        if !registry.contains(&self.strategy) {
            return Err(ConfigError::UnknownStrategy {
                name: self.strategy.clone(),
                available: registry.names().join(", "),
            });
        }

        Ok(())
    }

    pub fn wallet(&self) -> Result<Wallet, ConfigError> {
        if self.private_key.trim().is_empty() {
            return Err(ConfigError::MissingPrivateKey);
        }
        Wallet::from_base58(&self.private_key)
            .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))
    }

    pub fn primary_asset(&self) -> Asset {
        Asset::new(&self.primary_mint, &self.primary_mint_symbol)
    }

    /// One pair per secondary asset, quoted in the primary asset
    pub fn pairs(&self) -> Vec<AssetPair> {
        self.secondary_mints
            .iter()
            .zip(&self.secondary_mint_symbols)
            .map(|(mint, symbol)| AssetPair::new(Asset::new(mint, symbol), self.primary_asset()))
            .collect()
    }

    pub fn price_update_interval(&self) -> Duration {
        Duration::from_secs(self.price_update_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
