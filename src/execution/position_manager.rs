use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logging::TRADE_TARGET;
use crate::models::{Bar, IndicatorFrame};
use crate::persistence::write_atomic;
use crate::strategy::{EntryLevels, TrailingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    StrategyExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TrailingStop => "trailing stop",
            ExitReason::TakeProfit => "take-profit",
            ExitReason::StrategyExit => "strategy exit",
        };
        f.write_str(label)
    }
}

/// Position state of one asset pair.
///
/// A flat position has every level unset; only `enter` and `exit` on the
/// book move between the two states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub is_open: bool,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub trailing: Option<TrailingState>,
    /// Timestamp of the signal bar
    pub entry_time: Option<DateTime<Utc>>,
    /// Newest bar the trailing state has seen
    pub last_bar_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    fn open(levels: &EntryLevels) -> Self {
        Self {
            is_open: true,
            entry_price: Some(levels.entry_price),
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            trailing_stop: levels.trailing.and_then(|t| t.stop()),
            trailing: levels.trailing,
            entry_time: Some(levels.entry_time),
            last_bar_time: Some(levels.entry_time),
            opened_at: Some(Utc::now()),
        }
    }

    /// Highest high since the trailing stop activated
    pub fn trailing_high_water_mark(&self) -> Option<f64> {
        self.trailing
            .filter(|t| t.active)
            .map(|t| t.high_water_mark)
    }

    pub fn trailing_activation_target(&self) -> Option<f64> {
        self.trailing.map(|t| t.activation_target)
    }

    /// First matching exit condition in fixed precedence order
    pub fn exit_reason(&self, close: f64, exit_flag: bool) -> Option<ExitReason> {
        if !self.is_open {
            return None;
        }

        if self.stop_loss.is_some_and(|sl| close <= sl) {
            return Some(ExitReason::StopLoss);
        }
        if self.trailing_stop.is_some_and(|ts| close < ts) {
            return Some(ExitReason::TrailingStop);
        }
        if self.take_profit.is_some_and(|tp| close >= tp) {
            return Some(ExitReason::TakeProfit);
        }
        if exit_flag {
            return Some(ExitReason::StrategyExit);
        }
        None
    }

    /// Step the trailing stop over bars not yet seen. The newest seen bar is
    /// stepped again since it may still have been forming.
    fn advance(&mut self, bars: &[Bar]) -> bool {
        let Some(trailing) = self.trailing.as_mut() else {
            return false;
        };

        let mut changed = false;
        for bar in bars {
            if self.last_bar_time.is_some_and(|seen| bar.timestamp < seen) {
                continue;
            }
            let before = (trailing.active, trailing.high_water_mark);
            let stop = trailing.step(bar.high);
            changed |= before != (trailing.active, trailing.high_water_mark);
            self.trailing_stop = stop;

            if self.last_bar_time != Some(bar.timestamp) {
                self.last_bar_time = Some(bar.timestamp);
                changed = true;
            }
        }
        changed
    }
}

/// Positions of every traded pair, persisted as JSON after each mutation
#[derive(Debug)]
pub struct PositionBook {
    path: PathBuf,
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    /// Load the book, starting empty when the file does not exist yet
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let positions: BTreeMap<String, Position> = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        let open = positions.values().filter(|p| p.is_open).count();
        if open > 0 {
            tracing::info!("Restored {} open position(s) from {}", open, path.display());
        }

        Ok(Self { path, positions })
    }

    /// Position of a pair; flat when never traded
    pub fn position(&self, pair: &str) -> Position {
        self.positions.get(pair).cloned().unwrap_or_default()
    }

    pub fn is_open(&self, pair: &str) -> bool {
        self.positions.get(pair).is_some_and(|p| p.is_open)
    }

    /// Record a confirmed buy
    pub fn enter(&mut self, pair: &str, levels: &EntryLevels) -> anyhow::Result<()> {
        if self.is_open(pair) {
            bail!("Already have open position for {}", pair);
        }

        self.positions.insert(pair.to_string(), Position::open(levels));
        self.save()?;

        tracing::info!(
            target: TRADE_TARGET,
            "💾 Position opened for {} @ {:.6} (SL: {:?}, TP: {:?})",
            pair,
            levels.entry_price,
            levels.stop_loss,
            levels.take_profit
        );
        Ok(())
    }

    /// Record a confirmed sell; clears every level
    pub fn exit(&mut self, pair: &str) -> anyhow::Result<()> {
        if !self.is_open(pair) {
            bail!("No open position for {}", pair);
        }

        self.positions.insert(pair.to_string(), Position::flat());
        self.save()?;

        tracing::info!(target: TRADE_TARGET, "💾 Position closed for {}", pair);
        Ok(())
    }

    /// Advance the trailing stop of an open position; returns the current stop
    pub fn advance_trailing(&mut self, pair: &str, bars: &[Bar]) -> anyhow::Result<Option<f64>> {
        let Some(position) = self.positions.get_mut(pair).filter(|p| p.is_open) else {
            return Ok(None);
        };

        let was_active = position.trailing.is_some_and(|t| t.active);
        let changed = position.advance(bars);
        let stop = position.trailing_stop;

        if !was_active && position.trailing.is_some_and(|t| t.active) {
            tracing::info!(
                target: TRADE_TARGET,
                "📈 Trailing stop activated for {} at {:?}",
                pair,
                stop
            );
        }
        if changed {
            self.save()?;
        }
        Ok(stop)
    }

    /// Write the pair's position columns onto the newest frame row
    pub fn annotate(&self, pair: &str, frame: &mut IndicatorFrame) {
        let position = self.position(pair);
        let Some(row) = frame.last_mut() else {
            return;
        };

        row.clear_position();
        if position.is_open {
            row.position = true;
            row.entry_price = position.entry_price;
            row.stop_loss = position.stop_loss;
            row.take_profit = position.take_profit;
            row.trailing_stop = position.trailing_stop;
            row.trailing_stop_target = position.trailing_activation_target();
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(&self.positions)?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{RiskParams, TrailingParams};
    use chrono::TimeZone;
    use tempfile::TempDir;

    const PAIR: &str = "SOL_USDC";

    fn bar(minute: i64, close: f64, high: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            open: close,
            high,
            low: close,
            close,
        }
    }

    fn risk() -> RiskParams {
        RiskParams {
            stop_loss_pct: Some(5.0),
            take_profit_pct: Some(10.0),
            trailing: Some(TrailingParams {
                trailing_pct: 3.0,
                activation_pct: 5.0,
            }),
        }
    }

    fn levels_at(close: f64) -> EntryLevels {
        EntryLevels::from_signal_bar(&bar(0, close, close), &risk())
    }

    fn assert_flat_invariant(position: &Position) {
        if !position.is_open {
            assert!(position.entry_price.is_none());
            assert!(position.stop_loss.is_none());
            assert!(position.take_profit.is_none());
            assert!(position.trailing_stop.is_none());
        }
    }

    #[test]
    fn test_enter_sets_levels() {
        let dir = TempDir::new().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();

        book.enter(PAIR, &levels_at(100.0)).unwrap();
        let position = book.position(PAIR);

        assert!(position.is_open);
        assert_eq!(position.entry_price, Some(100.0));
        assert!((position.stop_loss.unwrap() - 95.0).abs() < 1e-9);
        assert!((position.take_profit.unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(position.trailing_stop, None);
        assert!((position.trailing_activation_target().unwrap() - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_double_entry() {
        let dir = TempDir::new().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();

        book.enter(PAIR, &levels_at(100.0)).unwrap();
        let err = book.enter(PAIR, &levels_at(90.0)).unwrap_err();

        assert!(err.to_string().contains("Already have open position"));
        assert_eq!(book.position(PAIR).entry_price, Some(100.0));
    }

    #[test]
    fn test_exit_clears_every_field() {
        let dir = TempDir::new().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();

        book.enter(PAIR, &levels_at(100.0)).unwrap();
        book.exit(PAIR).unwrap();

        let position = book.position(PAIR);
        assert_eq!(position, Position::flat());
        assert_flat_invariant(&position);
        assert!(book.exit(PAIR).is_err());
    }

    #[test]
    fn test_book_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");

        let mut book = PositionBook::load(&path).unwrap();
        book.enter(PAIR, &levels_at(100.0)).unwrap();
        drop(book);

        let restored = PositionBook::load(&path).unwrap();
        assert!(restored.is_open(PAIR));
        assert_eq!(restored.position(PAIR).entry_price, Some(100.0));
    }

    #[test]
    fn test_exit_precedence() {
        let position = Position::open(&levels_at(100.0));

        // Stop-loss wins even when the strategy also flags an exit
        assert_eq!(position.exit_reason(94.0, true), Some(ExitReason::StopLoss));
        assert_eq!(position.exit_reason(95.0, false), Some(ExitReason::StopLoss));
        assert_eq!(position.exit_reason(111.0, false), Some(ExitReason::TakeProfit));
        assert_eq!(position.exit_reason(101.0, true), Some(ExitReason::StrategyExit));
        assert_eq!(position.exit_reason(101.0, false), None);
    }

    #[test]
    fn test_trailing_stop_beats_take_profit() {
        let mut position = Position::open(&levels_at(100.0));
        position.advance(&[bar(1, 108.0, 120.0)]);

        // Trailing stop is 120 * 0.97 = 116.4; close 111 is above TP but below the stop
        assert_eq!(position.exit_reason(111.0, false), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn test_missing_take_profit_does_not_trigger() {
        let mut risk = risk();
        risk.take_profit_pct = None;
        let position = Position::open(&EntryLevels::from_signal_bar(&bar(0, 100.0, 100.0), &risk));

        assert_eq!(position.exit_reason(500.0, false), None);
    }

    #[test]
    fn test_advance_trailing_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();
        book.enter(PAIR, &levels_at(100.0)).unwrap();

        let bars = vec![
            bar(0, 100.0, 100.0),
            bar(1, 103.0, 104.0),
            bar(2, 106.0, 110.0),
        ];
        let stop = book.advance_trailing(PAIR, &bars).unwrap();
        assert!((stop.unwrap() - 106.7).abs() < 1e-9);

        // Refetch of the same window plus a lower bar: nothing moves down
        let mut more = bars.clone();
        more.push(bar(3, 101.0, 102.0));
        let stop = book.advance_trailing(PAIR, &more).unwrap();
        assert!((stop.unwrap() - 106.7).abs() < 1e-9);
        assert_eq!(book.position(PAIR).trailing_high_water_mark(), Some(110.0));
        assert_eq!(book.position(PAIR).last_bar_time, Some(more[3].timestamp));
    }

    #[test]
    fn test_annotate_last_row() {
        let dir = TempDir::new().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();
        let mut frame = IndicatorFrame::from_bars(&[bar(0, 100.0, 100.0), bar(1, 101.0, 101.0)]);

        book.enter(PAIR, &levels_at(100.0)).unwrap();
        book.annotate(PAIR, &mut frame);
        let last = frame.last().unwrap();
        assert!(last.position);
        assert_eq!(last.entry_price, Some(100.0));
        assert!(!frame.rows[0].position);

        book.exit(PAIR).unwrap();
        book.annotate(PAIR, &mut frame);
        let last = frame.last().unwrap();
        assert!(!last.position);
        assert_eq!(last.entry_price, None);
    }
}
