use std::fmt;

use chrono::NaiveDate;

use crate::error::{EngineError, Result};
use crate::execution::{order_deltas, ExecutionSink};
use crate::factor::FactorEngine;
use crate::market_data::MarketDataFeed;
use crate::model::cross_section::{AlphaVector, TargetWeights, ZScore};
use crate::model::order::{OrderAck, OrderRejection, RebalanceRequest, SubmitOutcome};
use crate::optimizer::{ConstraintSet, PortfolioOptimizer};
use crate::selection::{SelectionMask, SelectionPolicy};
use crate::universe::UniverseFilter;

/// Why a cycle ended without handing anything to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    EmptyUniverse,
    DegenerateCrossSection { valid: usize, std_dev: f64 },
    EmptyAlpha,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyUniverse => write!(f, "no security passed the universe filter"),
            SkipReason::DegenerateCrossSection { valid, std_dev } => write!(
                f,
                "degenerate cross-section ({} valid, std dev {:e})",
                valid, std_dev
            ),
            SkipReason::EmptyAlpha => write!(f, "selection mask is empty"),
        }
    }
}

/// Per-cycle output table.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub as_of: NaiveDate,
    pub universe_size: usize,
    pub valid_factors: usize,
    /// Z-scores of the selected names only.
    pub selected_zscores: ZScore,
    pub alpha: AlphaVector,
    pub targets: TargetWeights,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CyclePlan {
    Ready(CycleReport),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Submitted {
        report: CycleReport,
        request: RebalanceRequest,
        ack: OrderAck,
    },
    Rejected {
        report: CycleReport,
        rejection: OrderRejection,
    },
    Skipped(SkipReason),
}

/// Stage configuration shared by every cycle.
#[derive(Debug, Clone)]
pub struct RebalancePipeline {
    pub universe: UniverseFilter,
    pub factors: FactorEngine,
    pub selection: SelectionPolicy,
    pub optimizer: PortfolioOptimizer,
    pub constraints: ConstraintSet,
    pub min_weight_delta: f64,
}

/// Negated z-score over the selected names: recent losers get positive alpha
/// (long), recent winners negative alpha (short).
pub fn build_alpha(zscore: &ZScore, mask: &SelectionMask) -> Result<AlphaVector> {
    let alpha: AlphaVector = zscore
        .iter()
        .filter(|(id, _)| mask.contains(*id))
        .map(|(id, z)| (id.clone(), -z))
        .collect();
    if alpha.is_empty() {
        return Err(EngineError::EmptyAlpha);
    }
    Ok(alpha)
}

/// Runs universe -> factor -> selection -> optimizer -> sink, one cycle at a time.
pub struct RebalanceController<F, S> {
    pipeline: RebalancePipeline,
    feed: F,
    sink: S,
}

impl<F: MarketDataFeed, S: ExecutionSink> RebalanceController<F, S> {
    pub fn new(pipeline: RebalancePipeline, feed: F, sink: S) -> Self {
        Self {
            pipeline,
            feed,
            sink,
        }
    }

    pub fn pipeline(&self) -> &RebalancePipeline {
        &self.pipeline
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Compute target weights for `as_of` without touching the sink.
    ///
    /// Pure in the frozen market data: replaying the same date yields the same plan.
    pub fn plan_cycle(&self, as_of: NaiveDate) -> Result<CyclePlan> {
        let p = &self.pipeline;

        let snapshot = p.universe.select(as_of, &self.feed)?;
        if snapshot.is_empty() {
            return Ok(CyclePlan::Skipped(SkipReason::EmptyUniverse));
        }

        let factor = p.factors.compute_returns(&snapshot, &self.feed)?;
        let zscore = match FactorEngine::zscore(&factor) {
            Ok(z) => z,
            Err(EngineError::DegenerateCrossSection { valid, std_dev }) => {
                return Ok(CyclePlan::Skipped(SkipReason::DegenerateCrossSection {
                    valid,
                    std_dev,
                }))
            }
            Err(e) => return Err(e),
        };

        let mask = p.selection.select(&zscore);
        let alpha = match build_alpha(&zscore, &mask) {
            Ok(alpha) => alpha,
            Err(EngineError::EmptyAlpha) => return Ok(CyclePlan::Skipped(SkipReason::EmptyAlpha)),
            Err(e) => return Err(e),
        };

        let targets = p.optimizer.optimize(&alpha, &p.constraints)?;
        let selected_zscores: ZScore = zscore
            .iter()
            .filter(|(id, _)| mask.contains(*id))
            .map(|(id, z)| (id.clone(), *z))
            .collect();

        Ok(CyclePlan::Ready(CycleReport {
            as_of,
            universe_size: snapshot.len(),
            valid_factors: factor.len(),
            selected_zscores,
            alpha,
            targets,
        }))
    }

    /// Plan the cycle and, unless it is skipped, submit the full target vector
    /// with its order deltas. Nothing is submitted for a skipped cycle.
    pub fn run_cycle(&mut self, as_of: NaiveDate) -> Result<CycleOutcome> {
        let report = match self.plan_cycle(as_of)? {
            CyclePlan::Ready(report) => report,
            CyclePlan::Skipped(reason) => {
                tracing::warn!(%as_of, %reason, "Rebalance skipped");
                return Ok(CycleOutcome::Skipped(reason));
            }
        };

        let current = self.sink.current_positions()?;
        let deltas = order_deltas(&current, &report.targets, self.pipeline.min_weight_delta);
        let request = RebalanceRequest {
            cycle_id: format!(
                "rq-{}-{}",
                as_of.format("%Y%m%d"),
                &uuid::Uuid::new_v4().to_string()[..8]
            ),
            as_of,
            created_at: chrono::Utc::now(),
            targets: report.targets.clone(),
            deltas,
        };

        tracing::info!(
            cycle_id = %request.cycle_id,
            %as_of,
            universe = report.universe_size,
            valid = report.valid_factors,
            selected = report.alpha.len(),
            orders = request.deltas.len(),
            gross = report.targets.gross(),
            net = report.targets.net(),
            "Submitting rebalance"
        );

        match self.sink.submit_target_weights(&request)? {
            SubmitOutcome::Ack(ack) => Ok(CycleOutcome::Submitted {
                report,
                request,
                ack,
            }),
            SubmitOutcome::Rejected(rejection) => {
                tracing::error!(
                    cycle_id = %rejection.cycle_id,
                    reason = %rejection.reason,
                    "Rebalance rejected by execution sink"
                );
                Ok(CycleOutcome::Rejected { report, rejection })
            }
        }
    }
}
