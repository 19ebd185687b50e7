pub mod constraints;

pub use constraints::{Constraint, ConstraintSet};

use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use crate::error::{EngineError, Result};
use crate::model::cross_section::{AlphaVector, TargetWeights};
use crate::model::security::SecurityId;

/// Tolerance used when re-checking a solved weight vector.
pub const CONSTRAINT_EPS: f64 = 1e-9;

/// Weights smaller than this in magnitude are reported as exactly zero.
const ZERO_WEIGHT_EPS: f64 = 1e-12;

/// Alpha-maximizing target weights under linear constraints.
///
/// Each weight is split as `w = p - q` with `p, q >= 0`, which turns gross
/// exposure `Σ|w|` into the linear `Σ(p + q)`. Variables are added in security
/// id order, so identical inputs always produce the same program.
#[derive(Debug, Clone)]
pub struct PortfolioOptimizer {
    eps: f64,
}

impl Default for PortfolioOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioOptimizer {
    pub fn new() -> Self {
        Self {
            eps: CONSTRAINT_EPS,
        }
    }

    pub fn with_tolerance(eps: f64) -> Self {
        Self {
            eps: eps.abs().max(f64::EPSILON),
        }
    }

    /// Maximize `Σ alpha[s] * w[s]` subject to every constraint in `constraints`.
    ///
    /// An empty alpha vector is a valid no-trade outcome and yields empty
    /// weights. Constraints are never relaxed: an unsatisfiable set is
    /// returned as `InfeasibleConstraints`.
    pub fn optimize(
        &self,
        alpha: &AlphaVector,
        constraints: &ConstraintSet,
    ) -> Result<TargetWeights> {
        constraints.validate()?;
        if alpha.is_empty() {
            return Ok(TargetWeights::new());
        }
        if let Some(bad) = alpha.iter().find(|(_, a)| !a.is_finite()) {
            return Err(EngineError::InvalidConstraint(format!(
                "alpha for {} is not finite",
                bad.0
            )));
        }
        if !constraints.bounds_positions() {
            return Err(EngineError::InvalidConstraint(
                "no gross exposure or concentration bound: objective is unbounded".to_string(),
            ));
        }

        let ids: Vec<&SecurityId> = alpha.ids().collect();
        let n = ids.len();

        let mut vars = ProblemVariables::new();
        // Long and short legs, w_i = p_i - q_i
        let p: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();
        let q: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();

        let objective: Expression = alpha
            .values()
            .zip(p.iter().zip(&q))
            .fold(Expression::from(0.0), |acc, (a, (&pi, &qi))| {
                acc + a * pi - a * qi
            });

        let rows = constraint_rows(&p, &q, constraints)?;
        let mut problem = vars.maximise(objective).using(good_lp::default_solver);
        for row in rows {
            problem = problem.with(row);
        }

        let solution = problem.solve().map_err(|e| match e {
            ResolutionError::Unbounded => EngineError::InvalidConstraint(format!(
                "objective unbounded under {}",
                describe(constraints)
            )),
            ResolutionError::Infeasible => EngineError::InfeasibleConstraints(format!(
                "{} over {} names has no solution",
                describe(constraints),
                n
            )),
            other => EngineError::InfeasibleConstraints(format!(
                "{} over {} names: solver failed: {}",
                describe(constraints),
                n,
                other
            )),
        })?;

        let weights: TargetWeights = ids
            .iter()
            .zip(p.iter().zip(&q))
            .map(|(id, (&pi, &qi))| {
                let w = solution.value(pi) - solution.value(qi);
                let w = if w.abs() < ZERO_WEIGHT_EPS { 0.0 } else { w };
                ((*id).clone(), w)
            })
            .collect();

        constraints
            .check(&weights, self.eps)
            .map_err(|v| EngineError::InfeasibleConstraints(format!("solution violates {}", v)))?;

        tracing::debug!(
            names = n,
            objective = alpha.iter().map(|(id, a)| a * weights.get_or_zero(id)).sum::<f64>(),
            gross = weights.gross(),
            net = weights.net(),
            "Portfolio optimized"
        );
        Ok(weights)
    }
}

fn constraint_rows(
    p: &[Variable],
    q: &[Variable],
    constraints: &ConstraintSet,
) -> Result<Vec<good_lp::Constraint>> {
    let sum = |vs: &[Variable]| vs.iter().fold(Expression::from(0.0), |acc, &v| acc + v);
    let net = || sum(p) - sum(q);

    let mut rows = Vec::new();
    for c in constraints.iter() {
        match *c {
            Constraint::MaxGrossExposure(cap) => {
                let gross = sum(p) + sum(q);
                rows.push(constraint!(gross <= cap));
            }
            Constraint::PositionConcentration { min, max } => {
                if min > max {
                    return Err(EngineError::InfeasibleConstraints(format!(
                        "{}: lower bound exceeds upper bound",
                        c
                    )));
                }
                for (&pi, &qi) in p.iter().zip(q) {
                    let w = pi - qi;
                    rows.push(constraint!(w.clone() <= max));
                    rows.push(constraint!(w >= min));
                }
            }
            Constraint::DollarNeutral => {
                let net = net();
                rows.push(constraint!(net == 0.0));
            }
            Constraint::NetExposure { min, max } => {
                if min > max {
                    return Err(EngineError::InfeasibleConstraints(format!(
                        "{}: lower bound exceeds upper bound",
                        c
                    )));
                }
                let net = net();
                rows.push(constraint!(net.clone() <= max));
                rows.push(constraint!(net >= min));
            }
        }
    }
    Ok(rows)
}

fn describe(constraints: &ConstraintSet) -> String {
    let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
