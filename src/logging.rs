//! Console and file logging.
//!
//! Everything goes to stdout and `logs/general.*.log`. Trade events
//! (signals, swaps, stops, position changes) are logged under the
//! [`TRADE_TARGET`] target and are also written to `logs/transaction.*.log`,
//! so trade history can be read back without replaying bars.

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::Result;

/// Target of every trade event
pub const TRADE_TARGET: &str = "trades";

pub const LOG_DIR: &str = "logs";

const DEFAULT_FILTER: &str = "swapbot=info,trades=info";
const MAX_LOG_FILES: usize = 5;

/// Keeps the background log writers alive; dropping it flushes them
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Install the global subscriber: stdout plus the two rotating log files
pub fn init(log_dir: &Path) -> Result<LogGuards> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (files, guards) = file_layers(log_dir, Rotation::DAILY)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(files)
        .try_init()?;

    Ok(guards)
}

/// The general and transaction file layers
pub fn file_layers<S>(
    log_dir: &Path,
    rotation: Rotation,
) -> Result<(Vec<Box<dyn Layer<S> + Send + Sync>>, LogGuards)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(log_dir)?;

    let (general, general_guard) =
        tracing_appender::non_blocking(appender(log_dir, "general", rotation.clone())?);
    let (trades, trades_guard) =
        tracing_appender::non_blocking(appender(log_dir, "transaction", rotation)?);

    let layers = vec![
        fmt::layer().with_ansi(false).with_writer(general).boxed(),
        fmt::layer()
            .with_ansi(false)
            .with_writer(trades)
            .with_filter(filter_fn(|meta| meta.target() == TRADE_TARGET))
            .boxed(),
    ];

    Ok((
        layers,
        LogGuards {
            _guards: vec![general_guard, trades_guard],
        },
    ))
}

fn appender(log_dir: &Path, prefix: &str, rotation: Rotation) -> Result<RollingFileAppender> {
    Ok(RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)?)
}
