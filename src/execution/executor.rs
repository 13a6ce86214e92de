use std::fmt;

use crate::execution::{ExitReason, Position};
use crate::models::FrameRow;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    /// Spend `amount` of the primary asset (UI units)
    Buy { amount: f64 },
    /// Sell `amount` of the secondary asset (UI units)
    Sell { amount: f64, reason: ExitReason },
    Skip(SkipReason),
}

/// Why no trade is made this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientBalance,
    NoPositionToSell,
    Hold,
    AlreadyOpen,
    HoldingOpen,
    /// An exit fired but there is nothing to sell
    NothingToSell(ExitReason),
}

impl SkipReason {
    /// A signal fired but could not be acted on
    pub fn is_blocked_signal(&self) -> bool {
        matches!(
            self,
            SkipReason::InsufficientBalance | SkipReason::NothingToSell(_)
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientBalance => write!(f, "Insufficient balance for buy signal"),
            SkipReason::NoPositionToSell => write!(f, "No position to sell"),
            SkipReason::Hold => write!(f, "Hold signal"),
            SkipReason::AlreadyOpen => write!(f, "Already have open position"),
            SkipReason::HoldingOpen => write!(f, "Holding open position"),
            SkipReason::NothingToSell(exit) => {
                write!(f, "Sell signal ({}) but no balance to sell", exit)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

impl ExecutionDecision {
    fn skip(reason: SkipReason) -> Self {
        Self {
            action: ExecutionAction::Skip(reason),
            reason: reason.to_string(),
        }
    }
}

/// Turns the latest frame row and the pair's position into a trade decision
#[derive(Debug, Clone)]
pub struct Executor {
    position_size_pct: f64,
}

impl Executor {
    pub fn new(position_size_pct: f64) -> Self {
        Self { position_size_pct }
    }

    /// Decide what to do with one pair this cycle.
    ///
    /// `primary_balance` is what a buy may spend, `secondary_balance` what a
    /// sell would liquidate. Nothing here mutates the position: that only
    /// happens once a swap is confirmed.
    pub fn decide(
        &self,
        position: &Position,
        latest: &FrameRow,
        primary_balance: f64,
        secondary_balance: f64,
    ) -> ExecutionDecision {
        if position.is_open {
            return self.decide_open(position, latest, secondary_balance);
        }

        if latest.entry {
            if primary_balance <= 0.0 {
                return ExecutionDecision::skip(SkipReason::InsufficientBalance);
            }

            let amount = self.calculate_position_size(primary_balance);
            return ExecutionDecision {
                action: ExecutionAction::Buy { amount },
                reason: format!("Buy signal at {:.6}", latest.bar.close),
            };
        }

        if latest.exit {
            return ExecutionDecision::skip(SkipReason::NoPositionToSell);
        }

        ExecutionDecision::skip(SkipReason::Hold)
    }

    fn decide_open(
        &self,
        position: &Position,
        latest: &FrameRow,
        secondary_balance: f64,
    ) -> ExecutionDecision {
        let close = latest.bar.close;

        match position.exit_reason(close, latest.exit) {
            Some(reason) if secondary_balance > 0.0 => ExecutionDecision {
                action: ExecutionAction::Sell {
                    amount: secondary_balance,
                    reason,
                },
                reason: format!("Sell signal ({}) at {:.6}", reason, close),
            },
            Some(reason) => ExecutionDecision::skip(SkipReason::NothingToSell(reason)),
            None if latest.entry => ExecutionDecision::skip(SkipReason::AlreadyOpen),
            None => ExecutionDecision::skip(SkipReason::HoldingOpen),
        }
    }

    /// Share of the available primary balance committed to one buy
    fn calculate_position_size(&self, primary_balance: f64) -> f64 {
        primary_balance * self.position_size_pct / 100.0
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::Utc;

    fn row(close: f64, entry: bool, exit: bool) -> FrameRow {
        let mut row = FrameRow::new(Bar {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
        });
        row.entry = entry;
        row.exit = exit;
        row
    }

    fn open_position() -> Position {
        Position {
            is_open: true,
            entry_price: Some(100.0),
            stop_loss: Some(95.0),
            take_profit: Some(110.0),
            ..Position::flat()
        }
    }

    #[test]
    fn test_execute_buy_when_valid() {
        let executor = Executor::default();
        let decision = executor.decide(&Position::flat(), &row(100.0, true, false), 250.0, 0.0);

        assert_eq!(decision.action, ExecutionAction::Buy { amount: 250.0 });
        assert!(decision.reason.contains("Buy signal"));
    }

    #[test]
    fn test_position_sizing() {
        let executor = Executor::new(25.0);
        let decision = executor.decide(&Position::flat(), &row(100.0, true, false), 400.0, 0.0);
        assert_eq!(decision.action, ExecutionAction::Buy { amount: 100.0 });
    }

    #[test]
    fn test_skip_buy_on_zero_balance() {
        let executor = Executor::default();
        let decision = executor.decide(&Position::flat(), &row(100.0, true, false), 0.0, 0.0);

        assert_eq!(
            decision.action,
            ExecutionAction::Skip(SkipReason::InsufficientBalance)
        );
        assert!(decision.reason.contains("Insufficient balance"));
    }

    #[test]
    fn test_skip_buy_when_already_positioned() {
        let executor = Executor::default();
        let decision = executor.decide(&open_position(), &row(101.0, true, false), 500.0, 2.0);

        assert_eq!(decision.action, ExecutionAction::Skip(SkipReason::AlreadyOpen));
    }

    #[test]
    fn test_skip_sell_when_no_position() {
        let executor = Executor::default();
        let decision = executor.decide(&Position::flat(), &row(100.0, false, true), 500.0, 2.0);

        assert_eq!(
            decision.action,
            ExecutionAction::Skip(SkipReason::NoPositionToSell)
        );
    }

    #[test]
    fn test_stop_loss_wins_over_strategy_exit() {
        let executor = Executor::default();
        let decision = executor.decide(&open_position(), &row(94.0, false, true), 0.0, 3.5);

        assert_eq!(
            decision.action,
            ExecutionAction::Sell {
                amount: 3.5,
                reason: ExitReason::StopLoss
            }
        );
        assert!(decision.reason.contains("stop-loss"));
    }

    #[test]
    fn test_sell_without_balance_is_skipped() {
        let executor = Executor::default();
        let decision = executor.decide(&open_position(), &row(120.0, false, false), 0.0, 0.0);

        assert_eq!(
            decision.action,
            ExecutionAction::Skip(SkipReason::NothingToSell(ExitReason::TakeProfit))
        );
        assert!(decision.reason.contains("take-profit"));
    }

    #[test]
    fn test_hold() {
        let executor = Executor::default();
        let decision = executor.decide(&open_position(), &row(101.0, false, false), 0.0, 1.0);
        assert_eq!(decision.action, ExecutionAction::Skip(SkipReason::HoldingOpen));
    }

    #[test]
    fn test_blocked_signals_are_flagged() {
        assert!(SkipReason::InsufficientBalance.is_blocked_signal());
        assert!(SkipReason::NothingToSell(ExitReason::StopLoss).is_blocked_signal());
        assert!(!SkipReason::Hold.is_blocked_signal());
        assert!(!SkipReason::AlreadyOpen.is_blocked_signal());
    }
}
