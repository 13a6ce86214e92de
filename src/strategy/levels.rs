//! Stop-loss, take-profit and trailing-stop levels.
//!
//! These apply regardless of which strategy produced the entry/exit flags.
//! The trailing stop is a state machine over the bar sequence: it is
//! inactive until a bar's high first reaches the activation target, after
//! which it follows the highest high seen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::models::Bar;

/// Trailing stop parameters, both in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingParams {
    /// Distance of the stop below the high-water mark
    pub trailing_pct: f64,
    /// Gain over entry that activates the trailing stop
    pub activation_pct: f64,
}

/// Resolved risk percentages for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub trailing: Option<TrailingParams>,
}

impl RiskParams {
    /// Strategy-provided values win; configured defaults fill the gaps
    pub fn resolve(strategy: &dyn Strategy, defaults: &RiskParams) -> Self {
        Self {
            stop_loss_pct: strategy.stop_loss_pct().or(defaults.stop_loss_pct),
            take_profit_pct: strategy.take_profit_pct().or(defaults.take_profit_pct),
            trailing: strategy.trailing_params().or(defaults.trailing),
        }
    }
}

pub fn stop_loss_price(entry_price: f64, stop_loss_pct: f64) -> f64 {
    entry_price * (1.0 - stop_loss_pct / 100.0)
}

pub fn take_profit_price(entry_price: f64, take_profit_pct: f64) -> f64 {
    entry_price * (1.0 + take_profit_pct / 100.0)
}

/// Trailing stop state for one open position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    pub activation_target: f64,
    pub trailing_pct: f64,
    pub active: bool,
    /// Highest high since activation; meaningless while inactive
    pub high_water_mark: f64,
}

impl TrailingState {
    pub fn new(entry_price: f64, params: TrailingParams) -> Self {
        Self {
            activation_target: entry_price * (1.0 + params.activation_pct / 100.0),
            trailing_pct: params.trailing_pct,
            active: false,
            high_water_mark: entry_price,
        }
    }

    /// Feed one bar's high; returns the stop level after this bar
    pub fn step(&mut self, high: f64) -> Option<f64> {
        if !self.active && high >= self.activation_target {
            self.active = true;
            self.high_water_mark = high;
        }
        if self.active && high > self.high_water_mark {
            self.high_water_mark = high;
        }
        self.stop()
    }

    pub fn stop(&self) -> Option<f64> {
        self.active
            .then(|| self.high_water_mark * (1.0 - self.trailing_pct / 100.0))
    }
}

/// Replay the trailing stop over bar highs starting at the entry bar
pub fn replay_trailing(entry_price: f64, params: TrailingParams, highs: &[f64]) -> Vec<Option<f64>> {
    let mut state = TrailingState::new(entry_price, params);
    highs.iter().map(|&high| state.step(high)).collect()
}

/// Levels fixed at entry time
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLevels {
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing: Option<TrailingState>,
}

impl EntryLevels {
    /// Compute levels from the signal bar. The trailing state has already
    /// consumed the signal bar's high.
    pub fn from_signal_bar(bar: &Bar, risk: &RiskParams) -> Self {
        let entry_price = bar.close;
        let trailing = risk.trailing.map(|params| {
            let mut state = TrailingState::new(entry_price, params);
            state.step(bar.high);
            state
        });

        Self {
            entry_price,
            entry_time: bar.timestamp,
            stop_loss: risk.stop_loss_pct.map(|pct| stop_loss_price(entry_price, pct)),
            take_profit: risk.take_profit_pct.map(|pct| take_profit_price(entry_price, pct)),
            trailing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::DefaultStrategy;
    use chrono::TimeZone;

    const PARAMS: TrailingParams = TrailingParams {
        trailing_pct: 10.0,
        activation_pct: 5.0,
    };

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_stop_and_target_prices() {
        assert_close(stop_loss_price(100.0, 5.0), 95.0);
        assert_close(take_profit_price(100.0, 10.0), 110.0);
    }

    #[test]
    fn test_trailing_inactive_until_target() {
        let stops = replay_trailing(100.0, PARAMS, &[101.0, 104.9, 103.0]);
        assert_eq!(stops, vec![None, None, None]);
    }

    #[test]
    fn test_trailing_activation_and_tracking() {
        let stops = replay_trailing(100.0, PARAMS, &[101.0, 105.0, 103.0, 110.0, 107.0]);

        assert_eq!(stops[0], None);
        assert_close(stops[1].unwrap(), 94.5); // activates at 105
        assert_close(stops[2].unwrap(), 94.5); // lower high keeps the mark
        assert_close(stops[3].unwrap(), 99.0); // new high 110
        assert_close(stops[4].unwrap(), 99.0);
    }

    #[test]
    fn test_trailing_stays_active_after_pullback_below_target() {
        let stops = replay_trailing(100.0, PARAMS, &[106.0, 90.0]);
        assert!(stops[1].is_some());
    }

    #[test]
    fn test_entry_levels_from_signal_bar() {
        let bar = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            open: 99.0,
            high: 101.0,
            low: 98.0,
            close: 100.0,
        };
        let risk = RiskParams {
            stop_loss_pct: Some(5.0),
            take_profit_pct: Some(10.0),
            trailing: Some(PARAMS),
        };

        let levels = EntryLevels::from_signal_bar(&bar, &risk);
        assert_close(levels.entry_price, 100.0);
        assert_close(levels.stop_loss.unwrap(), 95.0);
        assert_close(levels.take_profit.unwrap(), 110.0);
        let trailing = levels.trailing.unwrap();
        assert!(!trailing.active);
        assert_close(trailing.activation_target, 105.0);
    }

    #[test]
    fn test_missing_take_profit_stays_unset() {
        let bar = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
        };
        let risk = RiskParams {
            stop_loss_pct: Some(5.0),
            ..Default::default()
        };
        let levels = EntryLevels::from_signal_bar(&bar, &risk);
        assert!(levels.take_profit.is_none());
        assert!(levels.trailing.is_none());
    }

    #[test]
    fn test_resolve_prefers_strategy_values() {
        let defaults = RiskParams {
            stop_loss_pct: Some(1.0),
            take_profit_pct: Some(2.0),
            trailing: None,
        };
        let resolved = RiskParams::resolve(&DefaultStrategy::default(), &defaults);
        assert_eq!(resolved.stop_loss_pct, Some(5.0));
        assert_eq!(resolved.take_profit_pct, Some(25.0));
        assert!(resolved.trailing.is_some());
    }
}
