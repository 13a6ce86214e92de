//! Flat-file storage for per-pair frames.

mod merge;

pub use merge::merge;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{AssetPair, Bar, FrameRow, IndicatorFrame};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const OHLC_COLUMNS: [&str; 5] = ["time", "open", "high", "low", "close"];
const POSITION_COLUMNS: [&str; 8] = [
    "entry",
    "exit",
    "position",
    "entry_price",
    "stoploss",
    "takeprofit",
    "trailing_stoploss",
    "trailing_stoploss_target",
];

/// Write `bytes` next to `path` and rename over it, so readers only ever
/// see the previous or the new file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let tmp = tmp_path(path);
    let mut file =
        File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// CSV store holding one frame file per asset pair
#[derive(Debug, Clone)]
pub struct CandleStore {
    dir: PathBuf,
}

impl CandleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, pair: &AssetPair) -> PathBuf {
        self.dir.join(format!("{}.csv", pair.key()))
    }

    /// Load a pair's frame; `None` when nothing has been stored yet
    pub fn load(&self, pair: &AssetPair) -> Result<Option<IndicatorFrame>> {
        let path = self.path_for(pair);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = reader.headers()?.clone();
        let columns: BTreeMap<&str, usize> =
            headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

        for required in OHLC_COLUMNS {
            if !columns.contains_key(required) {
                bail!("{} is missing column '{}'", path.display(), required);
            }
        }

        let indicator_columns: Vec<(&str, usize)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !OHLC_COLUMNS.contains(h) && !POSITION_COLUMNS.contains(h))
            .map(|(i, h)| (h, i))
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("{}: bad record {}", path.display(), line + 1))?;
            let field = |name: &str| columns.get(name).and_then(|&i| record.get(i)).unwrap_or("");

            let bar = Bar {
                timestamp: parse_time(field("time"))?,
                open: parse_f64(field("open"))?,
                high: parse_f64(field("high"))?,
                low: parse_f64(field("low"))?,
                close: parse_f64(field("close"))?,
            };

            let mut row = FrameRow::new(bar);
            for &(name, index) in &indicator_columns {
                if let Some(value) = parse_optional(record.get(index).unwrap_or(""))? {
                    row.indicators.insert(name.to_string(), value);
                }
            }
            row.entry = parse_flag(field("entry"));
            row.exit = parse_flag(field("exit"));
            row.position = parse_flag(field("position"));
            row.entry_price = parse_optional(field("entry_price"))?;
            row.stop_loss = parse_optional(field("stoploss"))?;
            row.take_profit = parse_optional(field("takeprofit"))?;
            row.trailing_stop = parse_optional(field("trailing_stoploss"))?;
            row.trailing_stop_target = parse_optional(field("trailing_stoploss_target"))?;
            rows.push(row);
        }

        rows.sort_by_key(|r| r.bar.timestamp);
        rows.dedup_by_key(|r| r.bar.timestamp);

        tracing::debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(Some(IndicatorFrame { rows }))
    }

    /// Replace a pair's frame file atomically
    pub fn save(&self, pair: &AssetPair, frame: &IndicatorFrame) -> Result<()> {
        let path = self.path_for(pair);
        let indicator_columns = frame.indicator_columns();

        let mut writer = csv::Writer::from_writer(Vec::new());

        let header: Vec<&str> = OHLC_COLUMNS
            .iter()
            .copied()
            .chain(indicator_columns.iter().map(String::as_str))
            .chain(POSITION_COLUMNS.iter().copied())
            .collect();
        writer.write_record(&header)?;

        for row in &frame.rows {
            let mut record = vec![
                row.bar.timestamp.format(TIME_FORMAT).to_string(),
                row.bar.open.to_string(),
                row.bar.high.to_string(),
                row.bar.low.to_string(),
                row.bar.close.to_string(),
            ];
            record.extend(
                indicator_columns
                    .iter()
                    .map(|name| format_optional(row.indicator(name))),
            );
            record.extend([
                format_flag(row.entry),
                format_flag(row.exit),
                format_flag(row.position),
                format_optional(row.entry_price),
                format_optional(row.stop_loss),
                format_optional(row.take_profit),
                format_optional(row.trailing_stop),
                format_optional(row.trailing_stop_target),
            ]);
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to encode frame for {}: {}", pair.key(), e.error()))?;
        write_atomic(&path, &bytes)?;

        tracing::debug!("Saved {} rows to {}", frame.len(), path.display());
        Ok(())
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, TIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Invalid time '{}'", value))
}

fn parse_f64(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid number '{}'", value))
}

fn parse_optional(value: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    parse_f64(value).map(Some)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "1.0" | "true" | "True")
}

fn format_flag(flag: bool) -> String {
    let value = if flag { "1" } else { "0" };
    value.to_string()
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
