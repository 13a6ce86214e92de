use std::collections::{BTreeMap, BTreeSet};

use super::Bar;

/// One bar plus everything derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub bar: Bar,
    /// Indicator columns; absent during an indicator's warm-up
    pub indicators: BTreeMap<String, f64>,
    pub entry: bool,
    pub exit: bool,
    pub position: bool,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub trailing_stop_target: Option<f64>,
}

impl FrameRow {
    pub fn new(bar: Bar) -> Self {
        Self {
            bar,
            indicators: BTreeMap::new(),
            entry: false,
            exit: false,
            position: false,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            trailing_stop: None,
            trailing_stop_target: None,
        }
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }

    /// Clear the position-derived columns
    pub fn clear_position(&mut self) {
        self.position = false;
        self.entry_price = None;
        self.stop_loss = None;
        self.take_profit = None;
        self.trailing_stop = None;
        self.trailing_stop_target = None;
    }
}

/// Bar series of one asset pair annotated with indicator and position columns.
///
/// Rows are sorted by timestamp with no duplicates. Only the last row's
/// flags are actionable; earlier flags are kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    pub rows: Vec<FrameRow>,
}

impl IndicatorFrame {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut rows: Vec<FrameRow> = bars.iter().copied().map(FrameRow::new).collect();
        rows.sort_by_key(|r| r.bar.timestamp);
        rows.dedup_by_key(|r| r.bar.timestamp);
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut FrameRow> {
        self.rows.last_mut()
    }

    /// Drop the oldest rows so at most `max_rows` remain
    pub fn retain_newest(&mut self, max_rows: usize) {
        if self.rows.len() > max_rows {
            let excess = self.rows.len() - max_rows;
            self.rows.drain(..excess);
        }
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.rows.iter().map(|r| r.bar).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.bar.close).collect()
    }

    /// Replace an indicator column; `None` entries remove the value from that row
    pub fn set_indicator(&mut self, name: &str, values: &[Option<f64>]) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            match value {
                Some(v) if v.is_finite() => {
                    row.indicators.insert(name.to_string(), *v);
                }
                _ => {
                    row.indicators.remove(name);
                }
            }
        }
    }

    pub fn indicator(&self, name: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.indicator(name)).collect()
    }

    /// Union of indicator column names across all rows, sorted
    pub fn indicator_columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.indicators.keys()).collect();
        names.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(minute: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    #[test]
    fn test_from_bars_sorts_and_dedupes() {
        let frame = IndicatorFrame::from_bars(&[bar(2, 3.0), bar(0, 1.0), bar(1, 2.0), bar(1, 2.0)]);
        assert_eq!(frame.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_indicator_skips_missing_values() {
        let mut frame = IndicatorFrame::from_bars(&[bar(0, 1.0), bar(1, 2.0)]);
        frame.set_indicator("rsi", &[None, Some(55.0)]);

        assert_eq!(frame.indicator("rsi"), vec![None, Some(55.0)]);
        assert_eq!(frame.indicator_columns(), vec!["rsi".to_string()]);
    }

    #[test]
    fn test_retain_newest() {
        let mut frame = IndicatorFrame::from_bars(&[bar(0, 1.0), bar(1, 2.0), bar(2, 3.0)]);
        frame.retain_newest(5);
        assert_eq!(frame.len(), 3);
        frame.retain_newest(2);
        assert_eq!(frame.closes(), vec![2.0, 3.0]);
    }
}
