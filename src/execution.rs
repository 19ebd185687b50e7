use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::model::cross_section::TargetWeights;
use crate::model::order::{OrderAck, OrderDelta, OrderRejection, OrderSide, RebalanceRequest, SubmitOutcome};

/// Write side of the external order-execution collaborator.
///
/// The sink owns the live position snapshot; the engine reads it once per
/// cycle to price order deltas and never mutates it directly.
pub trait ExecutionSink {
    /// Live positions expressed as signed fractions of capital.
    fn current_positions(&self) -> Result<TargetWeights>;

    /// Hand off one complete rebalance. Fire-and-forget from the engine's side:
    /// fills are reported back through `current_positions` on a later cycle.
    fn submit_target_weights(&mut self, request: &RebalanceRequest) -> Result<SubmitOutcome>;
}

/// `target - current` for every name in either vector, in id order.
///
/// Held names missing from `target` are closed (target 0). Deltas smaller
/// than `min_delta` in magnitude are dropped.
pub fn order_deltas(
    current: &TargetWeights,
    target: &TargetWeights,
    min_delta: f64,
) -> Vec<OrderDelta> {
    let ids: BTreeSet<_> = current.ids().chain(target.ids()).collect();
    ids.into_iter()
        .filter_map(|id| {
            let current_weight = current.get_or_zero(id);
            let target_weight = target.get_or_zero(id);
            let delta_weight = target_weight - current_weight;
            if delta_weight.abs() < min_delta || delta_weight == 0.0 {
                return None;
            }
            Some(OrderDelta {
                security: id.clone(),
                side: OrderSide::from_delta(delta_weight),
                current_weight,
                target_weight,
                delta_weight,
            })
        })
        .collect()
}

/// In-memory sink that records every request. Optionally fills instantly
/// (positions jump to target) or rejects with a fixed reason.
#[derive(Debug, Default)]
pub struct RecordingExecutionSink {
    positions: TargetWeights,
    submitted: Vec<RebalanceRequest>,
    fill_on_submit: bool,
    reject_reason: Option<String>,
}

impl RecordingExecutionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions(positions: TargetWeights) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn filling(mut self) -> Self {
        self.fill_on_submit = true;
        self
    }

    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.reject_reason = Some(reason.into());
        self
    }

    pub fn submitted(&self) -> &[RebalanceRequest] {
        &self.submitted
    }
}

impl ExecutionSink for RecordingExecutionSink {
    fn current_positions(&self) -> Result<TargetWeights> {
        Ok(self.positions.clone())
    }

    fn submit_target_weights(&mut self, request: &RebalanceRequest) -> Result<SubmitOutcome> {
        self.submitted.push(request.clone());
        if let Some(reason) = &self.reject_reason {
            return Ok(SubmitOutcome::Rejected(OrderRejection {
                cycle_id: request.cycle_id.clone(),
                reason: reason.clone(),
            }));
        }
        if self.fill_on_submit {
            self.positions = request.targets.clone();
        }
        Ok(SubmitOutcome::Ack(OrderAck {
            cycle_id: request.cycle_id.clone(),
            accepted_orders: request.deltas.len(),
        }))
    }
}

/// Paper-trading sink: appends each request as one JSON line to a journal and
/// treats targets as instantly filled by rewriting the positions file.
#[derive(Debug, Clone)]
pub struct PaperExecutionSink {
    journal_path: PathBuf,
    positions_path: PathBuf,
}

impl PaperExecutionSink {
    pub fn new(journal_path: impl Into<PathBuf>, positions_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
            positions_path: positions_path.into(),
        }
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl ExecutionSink for PaperExecutionSink {
    fn current_positions(&self) -> Result<TargetWeights> {
        if !self.positions_path.exists() {
            return Ok(TargetWeights::new());
        }
        let payload = std::fs::read_to_string(&self.positions_path)?;
        Ok(serde_json::from_str(&payload)?)
    }

    fn submit_target_weights(&mut self, request: &RebalanceRequest) -> Result<SubmitOutcome> {
        Self::ensure_parent(&self.journal_path)?;
        let line = serde_json::to_string(request)?;
        let mut journal = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)?;
        writeln!(journal, "{}", line)?;

        Self::ensure_parent(&self.positions_path)?;
        let positions = serde_json::to_string_pretty(&request.targets)?;
        std::fs::write(&self.positions_path, positions).map_err(|e| {
            EngineError::Execution(format!(
                "failed to write {}: {}",
                self.positions_path.display(),
                e
            ))
        })?;

        tracing::info!(
            cycle_id = %request.cycle_id,
            orders = request.deltas.len(),
            journal = %self.journal_path.display(),
            "Paper rebalance recorded"
        );
        Ok(SubmitOutcome::Ack(OrderAck {
            cycle_id: request.cycle_id.clone(),
            accepted_orders: request.deltas.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::security::SecurityId;

    fn weights(pairs: &[(&str, f64)]) -> TargetWeights {
        pairs
            .iter()
            .map(|(id, w)| (SecurityId::new(*id), *w))
            .collect()
    }

    #[test]
    fn deltas_close_names_missing_from_target() {
        let current = weights(&[("A", 0.01), ("B", -0.01)]);
        let target = weights(&[("A", 0.01), ("C", -0.01)]);
        let deltas = order_deltas(&current, &target, 1e-6);

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].security.as_str(), "B");
        assert_eq!(deltas[0].side, OrderSide::Buy);
        assert!((deltas[0].delta_weight - 0.01).abs() < 1e-12);
        assert_eq!(deltas[1].security.as_str(), "C");
        assert_eq!(deltas[1].side, OrderSide::Sell);
    }

    #[test]
    fn dust_deltas_are_dropped() {
        let current = weights(&[("A", 0.01)]);
        let target = weights(&[("A", 0.0100001)]);
        assert!(order_deltas(&current, &target, 1e-6).is_empty());
    }
}
