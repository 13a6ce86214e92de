use super::Strategy;
use crate::indicators::{rsi_series, sma_series};
use crate::models::IndicatorFrame;

/// Mean reversion trading strategy
///
/// Buys extreme dips and sells when price returns to the mean.
///
/// Entry conditions (ALL must be true):
/// - Price is significantly below moving average (oversold_threshold, e.g. -8%)
/// - RSI is extremely low (rsi_extreme, e.g. < 20)
/// - Momentum is slowing (not a falling knife)
///
/// Exit: price is back within `reversion_band` of the moving average.
/// The profit target and stop loss are enforced by the position tracker.
#[derive(Debug, Clone, Default)]
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

#[derive(Debug, Clone)]
pub struct MeanReversionConfig {
    /// Moving average period for mean calculation
    pub ma_period: usize,

    /// How far below MA constitutes "extreme dip" (e.g. -0.08 = 8% below)
    pub oversold_threshold: f64,

    /// RSI level for "extremely oversold" (e.g. 20)
    pub rsi_extreme: f64,

    /// Exit once price is within this fraction of the MA (e.g. 0.02 = 2%)
    pub reversion_band: f64,

    /// Profit target in percent
    pub profit_target_pct: f64,

    /// Hard stop in percent
    pub stop_loss_pct: f64,

    /// RSI period for calculation
    pub rsi_period: usize,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            ma_period: 20,
            oversold_threshold: -0.08,
            rsi_extreme: 20.0,
            reversion_band: 0.02,
            profit_target_pct: 6.0,
            stop_loss_pct: 8.0,
            rsi_period: 14,
        }
    }
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        Self { config }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn min_bars_required(&self) -> usize {
        // MA period + RSI period + a few extra for momentum check
        self.config.ma_period.max(self.config.rsi_period + 1) + 2
    }

    fn evaluate(&self, frame: &mut IndicatorFrame) {
        let prices = frame.closes();
        let ma = sma_series(&prices, self.config.ma_period);
        let rsi = rsi_series(&prices, self.config.rsi_period);

        frame.set_indicator("sma", &ma);
        frame.set_indicator("rsi", &rsi);

        for (i, row) in frame.rows.iter_mut().enumerate() {
            let (Some(mean), Some(rsi)) = (ma[i], rsi[i]) else {
                row.entry = false;
                row.exit = false;
                continue;
            };
            let price = prices[i];
            let price_vs_ma = (price - mean) / mean;

            // Momentum slowing = current drop is smaller than previous drop
            let momentum_slowing = i >= 2 && {
                let current_change = prices[i] - prices[i - 1];
                let previous_change = prices[i - 1] - prices[i - 2];
                current_change > previous_change
            };

            row.entry = price_vs_ma < self.config.oversold_threshold
                && rsi < self.config.rsi_extreme
                && momentum_slowing;
            row.exit = price_vs_ma >= -self.config.reversion_band;
        }
    }

    fn stop_loss_pct(&self) -> Option<f64> {
        Some(self.config.stop_loss_pct)
    }

    fn take_profit_pct(&self) -> Option<f64> {
        Some(self.config.profit_target_pct)
    }
}
