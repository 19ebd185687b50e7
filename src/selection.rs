use std::collections::BTreeSet;

use crate::error::{EngineError, Result};
use crate::model::cross_section::ZScore;
use crate::model::security::SecurityId;

/// Securities admitted for trading in one cycle.
pub type SelectionMask = BTreeSet<SecurityId>;

/// Percentile tail selection over a z-score cross-section.
///
/// The mask is the union of the inclusive bands `[p0, p_low]` and
/// `[p_high, p100]`. Percentiles interpolate linearly between closest ranks
/// (`rank = pct / 100 * (n - 1)`), so with small samples the cut points sit
/// between the extreme observation and its neighbour and usually only the
/// extremes themselves are admitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    low_pct: f64,
    high_pct: f64,
}

impl SelectionPolicy {
    pub fn new(low_pct: f64, high_pct: f64) -> Result<Self> {
        let in_range = |p: f64| p.is_finite() && (0.0..=100.0).contains(&p);
        if !in_range(low_pct) || !in_range(high_pct) {
            return Err(EngineError::Config(format!(
                "percentiles must be within [0, 100], got {} / {}",
                low_pct, high_pct
            )));
        }
        if low_pct > high_pct {
            return Err(EngineError::Config(format!(
                "low percentile {} exceeds high percentile {}",
                low_pct, high_pct
            )));
        }
        Ok(Self { low_pct, high_pct })
    }

    pub fn low_pct(&self) -> f64 {
        self.low_pct
    }

    pub fn high_pct(&self) -> f64 {
        self.high_pct
    }

    pub fn select(&self, zscore: &ZScore) -> SelectionMask {
        select(zscore, self.low_pct, self.high_pct)
    }
}

/// Bottom `low_pct` tail united with the top tail from `high_pct`.
pub fn select(zscore: &ZScore, low_pct: f64, high_pct: f64) -> SelectionMask {
    let mut mask = percentile_between(zscore, 0.0, low_pct);
    mask.extend(percentile_between(zscore, high_pct, 100.0));
    mask
}

/// Securities whose value lies inside the inclusive percentile band
/// `[percentile(min_pct), percentile(max_pct)]`.
pub fn percentile_between(zscore: &ZScore, min_pct: f64, max_pct: f64) -> SelectionMask {
    let mut sorted: Vec<f64> = zscore.values().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let (Some(lo), Some(hi)) = (percentile(&sorted, min_pct), percentile(&sorted, max_pct))
    else {
        return SelectionMask::new();
    };
    zscore
        .iter()
        .filter(|(_, z)| **z >= lo && **z <= hi)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Linear-interpolated percentile of an ascending slice. `None` when empty.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
