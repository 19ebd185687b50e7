use crate::error::{EngineError, Result};
use crate::market_data::MarketDataFeed;
use crate::model::cross_section::{FactorValue, ZScore};
use crate::model::security::{PriceBar, SecurityId};
use crate::model::universe::UniverseSnapshot;

/// Relative spread at or below which a cross-section counts as flat: the
/// threshold is this times `max(|mean|, 1)`.
const MIN_CROSS_SECTION_STD: f64 = 1e-12;

/// Rolling-window return factor and its cross-sectional z-score.
#[derive(Debug, Clone)]
pub struct FactorEngine {
    lookback_days: usize,
}

impl FactorEngine {
    pub fn new(lookback_days: usize) -> Self {
        Self {
            lookback_days: lookback_days.max(1),
        }
    }

    pub fn lookback_days(&self) -> usize {
        self.lookback_days
    }

    /// `close[t] / close[t - lookback] - 1` from the trailing bars.
    ///
    /// Needs `lookback + 1` bars; a missing, non-positive or non-finite price at
    /// either end counts as insufficient history.
    pub fn trailing_return(&self, security: &SecurityId, bars: &[PriceBar]) -> Result<f64> {
        let required = self.lookback_days + 1;
        let insufficient = || EngineError::InsufficientHistory {
            security: security.clone(),
            required,
            available: bars.len(),
        };
        if bars.len() < required {
            return Err(insufficient());
        }
        let end = bars[bars.len() - 1].close;
        let start = bars[bars.len() - required].close;
        if !(start > 0.0) || !start.is_finite() || !end.is_finite() {
            return Err(insufficient());
        }
        Ok(end / start - 1.0)
    }

    /// Trailing returns for every snapshot member with enough history.
    ///
    /// Members lacking history are left out of the mapping entirely.
    pub fn compute_returns<F: MarketDataFeed + ?Sized>(
        &self,
        snapshot: &UniverseSnapshot,
        feed: &F,
    ) -> Result<FactorValue> {
        let mut factor = FactorValue::new();
        let mut excluded = 0usize;
        for id in snapshot.iter() {
            let bars = feed.get_price_history(id, snapshot.date, self.lookback_days + 1)?;
            match self.trailing_return(id, &bars) {
                Ok(ret) => {
                    factor.insert(id.clone(), ret);
                }
                Err(EngineError::InsufficientHistory {
                    security,
                    required,
                    available,
                }) => {
                    excluded += 1;
                    tracing::debug!(%security, required, available, "Excluded from factor");
                }
                Err(e) => return Err(e),
            }
        }
        if excluded > 0 {
            tracing::info!(
                date = %snapshot.date,
                excluded,
                valid = factor.len(),
                "Securities excluded for insufficient history"
            );
        }
        Ok(factor)
    }

    /// Standardize over exactly the securities present in `factor`.
    pub fn zscore(factor: &FactorValue) -> Result<ZScore> {
        let valid = factor.len();
        if valid < 2 {
            return Err(EngineError::DegenerateCrossSection {
                valid,
                std_dev: 0.0,
            });
        }
        let mean = factor.mean().unwrap_or(0.0);
        let std_dev = factor.population_std().unwrap_or(0.0);
        if !std_dev.is_finite() || std_dev <= MIN_CROSS_SECTION_STD * mean.abs().max(1.0) {
            return Err(EngineError::DegenerateCrossSection { valid, std_dev });
        }
        Ok(factor.map_values(|v| (v - mean) / std_dev))
    }
}
