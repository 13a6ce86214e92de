use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{Bar, FrameRow, IndicatorFrame};

/// Merge freshly fetched bars into a stored frame.
///
/// Rows are keyed by timestamp; incoming OHLC replaces the stored bar while
/// the stored indicator and position columns of that row are kept. If the
/// stored frame ended inside an open position, that position's columns are
/// carried onto every merged row so the trade context survives the refetch.
pub fn merge(existing: &IndicatorFrame, incoming: &[Bar]) -> IndicatorFrame {
    let mut rows: BTreeMap<DateTime<Utc>, FrameRow> = existing
        .rows
        .iter()
        .map(|row| (row.bar.timestamp, row.clone()))
        .collect();

    for bar in incoming {
        rows.entry(bar.timestamp)
            .and_modify(|row| row.bar = *bar)
            .or_insert_with(|| FrameRow::new(*bar));
    }

    let mut merged = IndicatorFrame {
        rows: rows.into_values().collect(),
    };

    if let Some(open) = existing.last().filter(|row| row.position) {
        for row in &mut merged.rows {
            row.position = true;
            row.entry_price = open.entry_price;
            row.stop_loss = open.stop_loss;
            row.take_profit = open.take_profit;
            row.trailing_stop = open.trailing_stop;
            row.trailing_stop_target = open.trailing_stop_target;
        }
    }

    merged
}
