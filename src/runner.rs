use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::watch;

use crate::controller::{CycleOutcome, RebalanceController};
use crate::error::Result;
use crate::execution::ExecutionSink;
use crate::market_data::MarketDataFeed;
use crate::schedule::{Clock, RebalanceSchedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub submitted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub last_run: Option<NaiveDateTime>,
}

impl RunSummary {
    pub fn cycles(&self) -> usize {
        self.submitted + self.rejected + self.skipped
    }
}

/// Poll `clock` every `poll` and run one cycle whenever the schedule is due.
///
/// Cycles run inline on the polling task, so a cycle always finishes before the
/// next one can start. Returns on shutdown, after `max_cycles` cycles, or on the
/// first cycle error (configuration and data failures belong to the operator).
pub async fn run_scheduled<F, S, C>(
    controller: &mut RebalanceController<F, S>,
    schedule: &RebalanceSchedule,
    clock: &C,
    poll: Duration,
    max_cycles: Option<usize>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunSummary>
where
    F: MarketDataFeed,
    S: ExecutionSink,
    C: Clock,
{
    let mut summary = RunSummary::default();
    let mut ticker = tokio::time::interval(poll.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            tracing::info!("Scheduler shutting down");
            return Ok(summary);
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Scheduler shutting down");
                    return Ok(summary);
                }
            }
            _ = ticker.tick() => {
                let now = clock.now();
                if !schedule.is_due(now, summary.last_run) {
                    continue;
                }
                match controller.run_cycle(now.date())? {
                    CycleOutcome::Submitted { .. } => summary.submitted += 1,
                    CycleOutcome::Rejected { .. } => summary.rejected += 1,
                    CycleOutcome::Skipped(_) => summary.skipped += 1,
                }
                summary.last_run = Some(now);
                if max_cycles.is_some_and(|max| summary.cycles() >= max) {
                    return Ok(summary);
                }
            }
        }
    }
}
