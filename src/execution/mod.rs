// Trade decision and execution
mod balances;
pub mod executor;
pub mod position_manager;
pub mod retry;
pub mod swap;
pub mod trader;

pub use balances::BalanceOracle;
pub use executor::{ExecutionAction, ExecutionDecision, Executor, SkipReason};
pub use position_manager::{ExitReason, Position, PositionBook};
pub use swap::{AttemptError, SwapEngine, SwapOutcome, SwapReceipt};
pub use trader::{Collaborators, PairOutcome, Trader};
