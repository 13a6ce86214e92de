//! Property tests for trading invariants.
//!
//! Uses proptest to verify:
//! 1. Determinism: evaluating the same bars twice gives identical columns
//! 2. Merge idempotence: merging the same batch again changes nothing
//! 3. Trailing monotonicity: an active trailing stop never moves down
//! 4. Stop-loss precedence: a breached stop always wins over other exits
//! 5. Frame cap: retention never exceeds the row limit and keeps the newest bar
//! 6. Position invariant: a flat position carries no levels in any reachable state

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use swapbot::execution::{ExitReason, Position, PositionBook};
use swapbot::persistence::merge;
use swapbot::strategy::levels::replay_trailing;
use swapbot::strategy::{DefaultStrategy, EntryLevels, RiskParams, TrailingParams};
use swapbot::{Bar, IndicatorFrame};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), 1..max_len)
}

fn arb_pct() -> impl Strategy<Value = f64> {
    (0.5..20.0_f64).prop_map(|p| (p * 10.0).round() / 10.0)
}

fn to_bars(closes: &[f64]) -> Vec<Bar> {
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: origin + Duration::minutes(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
        })
        .collect()
}

// ── 1. Determinism ───────────────────────────────────────────────────

proptest! {
    /// The default strategy annotates identical bars identically.
    #[test]
    fn evaluate_is_deterministic(closes in arb_closes(80)) {
        let strategy = DefaultStrategy::default();
        let bars = to_bars(&closes);

        let mut first = IndicatorFrame::from_bars(&bars);
        let mut second = IndicatorFrame::from_bars(&bars);
        swapbot::Strategy::evaluate(&strategy, &mut first);
        swapbot::Strategy::evaluate(&strategy, &mut second);

        // Debug output compares warm-up gaps and any non-finite values exactly
        prop_assert_eq!(format!("{:?}", first.rows), format!("{:?}", second.rows));
    }
}

// ── 2. Merge Idempotence ─────────────────────────────────────────────

proptest! {
    /// Re-merging a batch that is already stored leaves the frame as it was.
    #[test]
    fn merge_is_idempotent(closes in arb_closes(60), overlap in 0usize..30) {
        let bars = to_bars(&closes);
        let start = bars.len().saturating_sub(overlap);

        let once = merge(&IndicatorFrame::default(), &bars);
        let twice = merge(&once, &bars[start..]);

        prop_assert_eq!(once.len(), bars.len());
        prop_assert_eq!(once.rows, twice.rows);
    }

    /// Merged timestamps are strictly increasing.
    #[test]
    fn merge_keeps_time_order(closes in arb_closes(60), split in 0usize..60) {
        let bars = to_bars(&closes);
        let split = split.min(bars.len());
        let mut shuffled = bars[split..].to_vec();
        shuffled.extend_from_slice(&bars[..split]);

        let frame = merge(&IndicatorFrame::default(), &shuffled);
        prop_assert_eq!(frame.len(), bars.len());
        for pair in frame.rows.windows(2) {
            prop_assert!(pair[0].bar.timestamp < pair[1].bar.timestamp);
        }
    }
}

// ── 3. Trailing Monotonicity ─────────────────────────────────────────

proptest! {
    /// Once active, the trailing stop only ratchets up and never deactivates.
    #[test]
    fn trailing_stop_only_rises(
        entry in arb_price(),
        highs in prop::collection::vec(arb_price(), 1..100),
        trailing_pct in arb_pct(),
        activation_pct in arb_pct(),
    ) {
        let params = TrailingParams { trailing_pct, activation_pct };
        let stops = replay_trailing(entry, params, &highs);

        let mut previous: Option<f64> = None;
        for stop in stops {
            match (previous, stop) {
                (Some(_), None) => prop_assert!(false, "trailing stop deactivated"),
                (Some(before), Some(after)) => prop_assert!(after >= before),
                _ => {}
            }
            previous = stop;
        }
    }
}

// ── 4. Stop-Loss Precedence ──────────────────────────────────────────

proptest! {
    /// A close at or below the stop exits as stop-loss whatever else fires.
    #[test]
    fn stop_loss_takes_precedence(
        entry in arb_price(),
        stop_pct in arb_pct(),
        drop in 0.0..0.5_f64,
        exit_flag in any::<bool>(),
    ) {
        let stop_loss = entry * (1.0 - stop_pct / 100.0);
        let position = Position {
            is_open: true,
            entry_price: Some(entry),
            stop_loss: Some(stop_loss),
            take_profit: Some(entry * 1.1),
            trailing_stop: Some(entry * 0.999),
            ..Position::flat()
        };

        let close = stop_loss * (1.0 - drop);
        prop_assert_eq!(position.exit_reason(close, exit_flag), Some(ExitReason::StopLoss));
    }

    /// A flat position never produces an exit.
    #[test]
    fn flat_position_never_exits(close in arb_price(), exit_flag in any::<bool>()) {
        prop_assert_eq!(Position::flat().exit_reason(close, exit_flag), None);
    }
}

// ── 5. Frame Cap ─────────────────────────────────────────────────────

proptest! {
    /// Retention bounds the frame and keeps the newest bar.
    #[test]
    fn retention_keeps_newest(closes in arb_closes(120), max_rows in 1usize..100) {
        let bars = to_bars(&closes);
        let mut frame = IndicatorFrame::from_bars(&bars);
        frame.retain_newest(max_rows);

        prop_assert!(frame.len() <= max_rows);
        prop_assert_eq!(frame.last().unwrap().bar.timestamp, bars.last().unwrap().timestamp);
    }
}

// ── 6. Position Invariant ────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Enter(f64),
    Exit,
    Tick(f64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_price().prop_map(Op::Enter),
        Just(Op::Exit),
        arb_price().prop_map(Op::Tick),
    ]
}

proptest! {
    /// Whatever sequence of entries, exits and bars is applied, a flat
    /// position has no entry price or stop levels, and an open one has an
    /// entry price.
    #[test]
    fn flat_positions_carry_no_levels(ops in prop::collection::vec(arb_op(), 1..40)) {
        let dir = tempfile::tempdir().unwrap();
        let mut book = PositionBook::load(dir.path().join("positions.json")).unwrap();
        let risk = RiskParams {
            stop_loss_pct: Some(5.0),
            take_profit_pct: Some(10.0),
            trailing: Some(TrailingParams { trailing_pct: 3.0, activation_pct: 5.0 }),
        };

        let mut minute = 0;
        for op in ops {
            minute += 1;
            let bar = to_bars(&vec![1.0; minute]).pop().unwrap();
            match op {
                Op::Enter(price) => {
                    let bar = Bar { close: price, high: price * 1.01, ..bar };
                    let was_open = book.is_open("SOL_USDC");
                    let entered = book.enter("SOL_USDC", &EntryLevels::from_signal_bar(&bar, &risk));
                    prop_assert_eq!(entered.is_err(), was_open);
                }
                Op::Exit => {
                    let was_open = book.is_open("SOL_USDC");
                    prop_assert_eq!(book.exit("SOL_USDC").is_ok(), was_open);
                }
                Op::Tick(high) => {
                    let bar = Bar { high, ..bar };
                    book.advance_trailing("SOL_USDC", &[bar]).unwrap();
                }
            }

            let position = book.position("SOL_USDC");
            if position.is_open {
                prop_assert!(position.entry_price.is_some());
            } else {
                prop_assert!(position.entry_price.is_none());
                prop_assert!(position.stop_loss.is_none());
                prop_assert!(position.take_profit.is_none());
                prop_assert!(position.trailing_stop.is_none());
            }
        }
    }
}
