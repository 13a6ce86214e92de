// Trading strategy module
pub mod default;
pub mod levels;
pub mod mean_reversion;
pub mod registry;

use crate::models::IndicatorFrame;

pub use default::{DefaultStrategy, DefaultStrategyConfig};
pub use levels::{EntryLevels, RiskParams, TrailingParams, TrailingState};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use registry::StrategyRegistry;

/// Base trait for all trading strategies
///
/// A strategy annotates a bar series with its indicator columns and the
/// `entry`/`exit` flags. It must be deterministic: the same bars always
/// produce the same columns. Stop and target levels are optional; when a
/// strategy does not model them the configured risk defaults are used.
pub trait Strategy: Send + Sync {
    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum bars before the latest row can carry a meaningful flag
    fn min_bars_required(&self) -> usize;

    /// Compute indicator columns and entry/exit flags for every row
    fn evaluate(&self, frame: &mut IndicatorFrame);

    fn stop_loss_pct(&self) -> Option<f64> {
        None
    }

    fn take_profit_pct(&self) -> Option<f64> {
        None
    }

    fn trailing_params(&self) -> Option<TrailingParams> {
        None
    }
}
