use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::security::SecurityId;

/// One value per security for a single evaluation date.
///
/// Backed by a `BTreeMap` so iteration order is the security id order, which
/// keeps every downstream stage (percentiles, LP column layout) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrossSection {
    values: BTreeMap<SecurityId, f64>,
}

/// Trailing return per security over the lookback window.
pub type FactorValue = CrossSection;
/// Cross-sectionally standardized factor.
pub type ZScore = CrossSection;
/// Signed optimization score per selected security.
pub type AlphaVector = CrossSection;
/// Signed fraction of capital per security.
pub type TargetWeights = CrossSection;

impl CrossSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SecurityId, value: f64) -> Option<f64> {
        self.values.insert(id, value)
    }

    pub fn get(&self, id: &SecurityId) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// Value for `id`, or zero when absent. Used for weights, where a missing
    /// name means "no position".
    pub fn get_or_zero(&self, id: &SecurityId) -> f64 {
        self.get(id).unwrap_or(0.0)
    }

    pub fn contains(&self, id: &SecurityId) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SecurityId, f64> {
        self.values.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SecurityId> {
        self.values.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.values().copied()
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        self.iter().map(|(id, v)| (id.clone(), f(*v))).collect()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.values().sum::<f64>() / self.len() as f64)
    }

    /// Population standard deviation (divides by `n`).
    pub fn population_std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self
            .values()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / self.len() as f64;
        Some(variance.sqrt())
    }

    /// Sum of absolute values; the gross exposure of a weight vector.
    pub fn gross(&self) -> f64 {
        self.values().map(f64::abs).sum()
    }

    /// Signed sum; the net exposure of a weight vector.
    pub fn net(&self) -> f64 {
        self.values().sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.values().map(f64::abs).fold(0.0, f64::max)
    }
}

impl FromIterator<(SecurityId, f64)> for CrossSection {
    fn from_iter<T: IntoIterator<Item = (SecurityId, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CrossSection {
    type Item = (&'a SecurityId, &'a f64);
    type IntoIter = btree_map::Iter<'a, SecurityId, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
