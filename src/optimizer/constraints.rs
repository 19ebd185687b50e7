use std::fmt;

use crate::error::{EngineError, Result};
use crate::model::cross_section::TargetWeights;

/// One linear restriction on the target weight vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// `Σ |w| <= cap`
    MaxGrossExposure(f64),
    /// `min <= w[s] <= max` for every security.
    PositionConcentration { min: f64, max: f64 },
    /// `Σ w == 0`
    DollarNeutral,
    /// `min <= Σ w <= max`
    NetExposure { min: f64, max: f64 },
}

impl Constraint {
    pub fn max_gross_exposure(cap: f64) -> Self {
        Constraint::MaxGrossExposure(cap)
    }

    /// Symmetric per-name bounds `[-bound, bound]`.
    pub fn position_concentration(bound: f64) -> Self {
        Constraint::PositionConcentration {
            min: -bound,
            max: bound,
        }
    }

    pub fn with_equal_bounds(min: f64, max: f64) -> Self {
        Constraint::PositionConcentration { min, max }
    }

    /// Reject parameters no weight vector could ever be checked against.
    pub fn validate(&self) -> Result<()> {
        let finite = match *self {
            Constraint::MaxGrossExposure(cap) => cap.is_finite(),
            Constraint::PositionConcentration { min, max }
            | Constraint::NetExposure { min, max } => min.is_finite() && max.is_finite(),
            Constraint::DollarNeutral => true,
        };
        if !finite {
            return Err(EngineError::InvalidConstraint(format!(
                "{} has a non-finite parameter",
                self
            )));
        }
        Ok(())
    }

    /// Describe the first violation beyond `eps`, if any.
    pub fn violation(&self, weights: &TargetWeights, eps: f64) -> Option<String> {
        match *self {
            Constraint::MaxGrossExposure(cap) => {
                let gross = weights.gross();
                (gross > cap + eps).then(|| format!("gross exposure {:.6} > {}", gross, cap))
            }
            Constraint::PositionConcentration { min, max } => weights
                .iter()
                .find(|(_, w)| **w < min - eps || **w > max + eps)
                .map(|(id, w)| format!("{} weight {:.6} outside [{}, {}]", id, w, min, max)),
            Constraint::DollarNeutral => {
                let net = weights.net();
                (net.abs() > eps).then(|| format!("net exposure {:.6} != 0", net))
            }
            Constraint::NetExposure { min, max } => {
                let net = weights.net();
                (net < min - eps || net > max + eps)
                    .then(|| format!("net exposure {:.6} outside [{}, {}]", net, min, max))
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::MaxGrossExposure(cap) => write!(f, "MaxGrossExposure({})", cap),
            Constraint::PositionConcentration { min, max } => {
                write!(f, "PositionConcentration[{}, {}]", min, max)
            }
            Constraint::DollarNeutral => write!(f, "DollarNeutral"),
            Constraint::NetExposure { min, max } => write!(f, "NetExposure[{}, {}]", min, max),
        }
    }
}

/// Ordered constraint list, fixed for a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Gross cap, symmetric per-name bound and dollar neutrality.
    pub fn mean_reversion(max_gross_exposure: f64, max_position_concentration: f64) -> Self {
        Self::new(vec![
            Constraint::max_gross_exposure(max_gross_exposure),
            Constraint::position_concentration(max_position_concentration),
            Constraint::DollarNeutral,
        ])
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.constraints.iter().try_for_each(Constraint::validate)
    }

    /// Check every constraint; the error lists all violations.
    pub fn check(&self, weights: &TargetWeights, eps: f64) -> std::result::Result<(), String> {
        let violations: Vec<String> = self
            .constraints
            .iter()
            .filter_map(|c| c.violation(weights, eps))
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }

    /// Whether the set bounds every weight, directly or through the gross cap.
    pub(crate) fn bounds_positions(&self) -> bool {
        self.constraints.iter().any(|c| {
            matches!(
                c,
                Constraint::MaxGrossExposure(_) | Constraint::PositionConcentration { .. }
            )
        })
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = Constraint>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
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
    fn default_set_accepts_balanced_book() {
        let set = ConstraintSet::mean_reversion(2.0, 0.01);
        let w = weights(&[("A", 0.01), ("B", -0.01)]);
        assert!(set.check(&w, 1e-9).is_ok());
    }

    #[test]
    fn violations_are_reported_per_constraint() {
        let set = ConstraintSet::mean_reversion(0.015, 0.01);
        let w = weights(&[("A", 0.02), ("B", -0.01)]);
        let err = set.check(&w, 1e-9).unwrap_err();
        assert!(err.contains("gross exposure"));
        assert!(err.contains("A weight"));
        assert!(err.contains("net exposure"));
    }

    #[test]
    fn non_finite_parameters_are_invalid() {
        assert!(Constraint::MaxGrossExposure(f64::NAN).validate().is_err());
        assert!(Constraint::with_equal_bounds(-0.01, f64::INFINITY)
            .validate()
            .is_err());
        assert!(Constraint::DollarNeutral.validate().is_ok());
    }
}
