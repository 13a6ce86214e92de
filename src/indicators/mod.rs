// Technical indicators module
// Per-bar series for EMA, SMA, Bollinger Bands and RSI

pub mod bollinger;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{bollinger_bands, BollingerBands};
pub use moving_average::{ema_series, rolling_std_series, sma_series};
pub use rsi::rsi_series;
