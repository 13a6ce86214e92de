use super::{Strategy, TrailingParams};
use crate::indicators::{bollinger_bands, ema_series, rsi_series};
use crate::models::IndicatorFrame;

/// Configuration for the default EMA/Bollinger/RSI strategy
#[derive(Debug, Clone)]
pub struct DefaultStrategyConfig {
    pub short_ema_period: usize,
    pub medium_ema_period: usize,
    pub bband_period: usize,
    pub bband_std_dev: f64,
    pub rsi_period: usize,
    pub rsi_entry_threshold: f64,
    pub rsi_exit_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing: TrailingParams,
}

impl Default for DefaultStrategyConfig {
    fn default() -> Self {
        Self {
            short_ema_period: 5,
            medium_ema_period: 21,
            bband_period: 14,
            bband_std_dev: 2.0,
            rsi_period: 14,
            rsi_entry_threshold: 31.0,
            rsi_exit_threshold: 65.0,
            stop_loss_pct: 5.0,
            take_profit_pct: 25.0,
            trailing: TrailingParams {
                trailing_pct: 3.0,
                activation_pct: 5.0,
            },
        }
    }
}

/// EMA crossover or Bollinger Band breach, gated by RSI
///
/// Entry: (short EMA > medium EMA OR close < lower band) AND RSI <= entry threshold
/// Exit:  (short EMA < medium EMA OR close > upper band) AND RSI >= exit threshold
#[derive(Debug, Clone, Default)]
pub struct DefaultStrategy {
    config: DefaultStrategyConfig,
}

impl DefaultStrategy {
    pub fn new(config: DefaultStrategyConfig) -> Self {
        Self { config }
    }
}

impl Strategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn min_bars_required(&self) -> usize {
        self.config
            .medium_ema_period
            .max(self.config.bband_period)
            .max(self.config.rsi_period + 1)
    }

    fn evaluate(&self, frame: &mut IndicatorFrame) {
        let closes = frame.closes();
        let cfg = &self.config;

        let ema_s = ema_series(&closes, cfg.short_ema_period);
        let ema_m = ema_series(&closes, cfg.medium_ema_period);
        let bands = bollinger_bands(&closes, cfg.bband_period, cfg.bband_std_dev);
        let rsi = rsi_series(&closes, cfg.rsi_period);

        frame.set_indicator("ema_s", &ema_s);
        frame.set_indicator("ema_m", &ema_m);
        frame.set_indicator("upper_bband", &bands.upper);
        frame.set_indicator("lower_bband", &bands.lower);
        frame.set_indicator("rsi", &rsi);

        for (i, row) in frame.rows.iter_mut().enumerate() {
            let close = row.bar.close;
            let crossed_up = matches!((ema_s[i], ema_m[i]), (Some(s), Some(m)) if s > m);
            let crossed_down = matches!((ema_s[i], ema_m[i]), (Some(s), Some(m)) if s < m);
            let below_lower = matches!(bands.lower[i], Some(lower) if close < lower);
            let above_upper = matches!(bands.upper[i], Some(upper) if close > upper);

            row.entry = (crossed_up || below_lower)
                && matches!(rsi[i], Some(r) if r <= cfg.rsi_entry_threshold);
            row.exit = (crossed_down || above_upper)
                && matches!(rsi[i], Some(r) if r >= cfg.rsi_exit_threshold);
        }
    }

    fn stop_loss_pct(&self) -> Option<f64> {
        Some(self.config.stop_loss_pct)
    }

    fn take_profit_pct(&self) -> Option<f64> {
        Some(self.config.take_profit_pct)
    }

    fn trailing_params(&self) -> Option<TrailingParams> {
        Some(self.config.trailing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn frame_from_closes(closes: &[f64]) -> IndicatorFrame {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: close,
                high: close * 1.001,
                low: close * 0.999,
                close,
            })
            .collect();
        IndicatorFrame::from_bars(&bars)
    }

    #[test]
    fn test_columns_populated() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let mut frame = frame_from_closes(&closes);
        DefaultStrategy::default().evaluate(&mut frame);

        let columns = frame.indicator_columns();
        for name in ["ema_s", "ema_m", "upper_bband", "lower_bband", "rsi"] {
            assert!(columns.contains(&name.to_string()), "missing {}", name);
        }
        assert!(frame.rows[0].indicators.is_empty());
    }

    #[test]
    fn test_entry_on_oversold_breach_of_lower_band() {
        // Steady market followed by a sharp sell-off: RSI collapses and the
        // last close falls below the lower band.
        let mut closes = vec![100.0; 30];
        closes.extend([99.0, 98.0, 96.0, 93.0, 88.0]);
        let mut frame = frame_from_closes(&closes);
        DefaultStrategy::default().evaluate(&mut frame);

        let last = frame.last().unwrap();
        assert!(last.indicator("rsi").unwrap() <= 31.0);
        assert!(last.entry);
        assert!(!last.exit);
    }

    #[test]
    fn test_exit_on_overbought_breach_of_upper_band() {
        let mut closes = vec![100.0; 30];
        closes.extend([101.0, 102.0, 104.0, 107.0, 112.0]);
        let mut frame = frame_from_closes(&closes);
        DefaultStrategy::default().evaluate(&mut frame);

        let last = frame.last().unwrap();
        assert!(last.indicator("rsi").unwrap() >= 65.0);
        assert!(last.exit);
        assert!(!last.entry);
    }

    #[test]
    fn test_no_flags_during_warmup() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        let mut frame = frame_from_closes(&closes);
        DefaultStrategy::default().evaluate(&mut frame);
        assert!(frame.rows.iter().all(|r| !r.entry && !r.exit));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + ((i * 7) % 13) as f64).collect();
        let mut a = frame_from_closes(&closes);
        let mut b = frame_from_closes(&closes);
        let strategy = DefaultStrategy::default();
        strategy.evaluate(&mut a);
        strategy.evaluate(&mut b);
        assert_eq!(a, b);
    }
}
