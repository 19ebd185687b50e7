use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Result;
use crate::market_data::MarketDataFeed;
use crate::model::security::SecurityInfo;
use crate::model::universe::UniverseSnapshot;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UniverseFilterConfig {
    /// Minimum latest adjusted close.
    pub min_price: f64,
    /// Minimum mean daily dollar volume over `dollar_volume_window` bars.
    pub min_avg_dollar_volume: f64,
    pub dollar_volume_window: usize,
    /// Only enforced for securities that publish a market cap.
    pub min_market_cap: Option<f64>,
    pub require_primary_share: bool,
    /// Calendar days the latest bar may trail the evaluation date.
    pub max_stale_days: u32,
}

impl Default for UniverseFilterConfig {
    fn default() -> Self {
        Self {
            min_price: 5.0,
            min_avg_dollar_volume: 2_500_000.0,
            dollar_volume_window: 200,
            min_market_cap: Some(350_000_000.0),
            require_primary_share: true,
            max_stale_days: 5,
        }
    }
}

/// Liquidity and tradability screen producing the per-date universe.
#[derive(Debug, Clone)]
pub struct UniverseFilter {
    cfg: UniverseFilterConfig,
}

impl UniverseFilter {
    pub fn new(cfg: UniverseFilterConfig) -> Self {
        Self {
            cfg: UniverseFilterConfig {
                dollar_volume_window: cfg.dollar_volume_window.max(1),
                ..cfg
            },
        }
    }

    pub fn config(&self) -> &UniverseFilterConfig {
        &self.cfg
    }

    /// Apply every predicate to the feed's security list as of `date`.
    ///
    /// An empty result is a valid snapshot, not an error.
    pub fn select<F: MarketDataFeed + ?Sized>(
        &self,
        date: NaiveDate,
        feed: &F,
    ) -> Result<UniverseSnapshot> {
        let mut members = Vec::new();
        for info in feed.list_securities(date)? {
            if !self.passes_listing(&info) {
                continue;
            }
            let bars = feed.get_price_history(&info.id, date, self.cfg.dollar_volume_window)?;
            let Some(last) = bars.last() else {
                continue;
            };
            if (date - last.date).num_days() > i64::from(self.cfg.max_stale_days) {
                tracing::debug!(
                    security = %info.id,
                    last_bar = %last.date,
                    %date,
                    "Excluded: no recent bar"
                );
                continue;
            }
            if !last.close.is_finite() || last.close < self.cfg.min_price {
                continue;
            }
            let avg_dollar_volume =
                bars.iter().map(|b| b.dollar_volume()).sum::<f64>() / bars.len() as f64;
            if !(avg_dollar_volume >= self.cfg.min_avg_dollar_volume) {
                continue;
            }
            members.push(info.id);
        }

        let snapshot = UniverseSnapshot::new(date, members);
        tracing::debug!(%date, size = snapshot.len(), "Universe selected");
        Ok(snapshot)
    }

    fn passes_listing(&self, info: &SecurityInfo) -> bool {
        if info.halted {
            return false;
        }
        if self.cfg.require_primary_share && !info.primary_share {
            return false;
        }
        match (self.cfg.min_market_cap, info.market_cap) {
            (Some(min), Some(cap)) => cap >= min,
            _ => true,
        }
    }
}
