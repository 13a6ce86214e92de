//! Fixed-interval poll loop with overlap protection.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One analysis cycle driven by the scheduler
#[async_trait]
pub trait PollCycle: Send {
    async fn run_cycle(&mut self);
}

pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Run one cycle now and then on every interval boundary until
    /// `shutdown` resolves. Returns the number of completed cycles.
    ///
    /// A cycle always runs to completion: `shutdown` is only polled between
    /// cycles. Ticks that fall inside a running cycle are dropped.
    pub async fn run<C, S>(&self, cycle: &mut C, shutdown: S) -> u64
    where
        C: PollCycle + ?Sized,
        S: Future<Output = ()>,
    {
        let origin = Instant::now();
        let mut ticker = interval_at(origin, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut completed = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            cycle.run_cycle().await;
            completed += 1;

            let elapsed = started.elapsed();
            if elapsed > self.period {
                // Drop every boundary that passed during the cycle
                let next = next_boundary(origin, self.period, Instant::now());
                tracing::warn!(
                    "⏱️  Cycle took {:.1}s (interval {}s), overlapping ticks skipped; next cycle in {:.1}s",
                    elapsed.as_secs_f64(),
                    self.period.as_secs(),
                    (next - Instant::now()).as_secs_f64()
                );
                ticker.reset_at(next);
            }
        }

        tracing::info!("Scheduler stopped after {} cycle(s)", completed);
        completed
    }
}

/// First interval boundary strictly after `now`
fn next_boundary(origin: Instant, period: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(origin).as_nanos();
    let periods = elapsed / period.as_nanos().max(1) + 1;
    origin + Duration::from_nanos((period.as_nanos() * periods) as u64)
}
