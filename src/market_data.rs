use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::security::{PriceBar, SecurityId, SecurityInfo};

/// Read side of the external market-data collaborator.
///
/// Implementations own the price history; the engine only reads it and treats
/// it as frozen for the duration of one cycle.
pub trait MarketDataFeed {
    /// Securities known to the feed as of `as_of`, with their listing metadata.
    fn list_securities(&self, as_of: NaiveDate) -> Result<Vec<SecurityInfo>>;

    /// Up to `days` most recent bars dated on or before `as_of`, oldest first.
    fn get_price_history(
        &self,
        security: &SecurityId,
        as_of: NaiveDate,
        days: usize,
    ) -> Result<Vec<PriceBar>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecurityRecord {
    #[serde(flatten)]
    info: SecurityInfo,
    #[serde(default)]
    bars: Vec<PriceBar>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSnapshot {
    securities: Vec<SecurityRecord>,
}

/// Frozen in-memory market data, loadable from a JSON snapshot file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketData {
    records: BTreeMap<SecurityId, SecurityRecord>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let payload = std::fs::read_to_string(path)?;
        Self::from_json_str(&payload)
    }

    pub fn from_json_str(payload: &str) -> Result<Self> {
        let persisted: PersistedSnapshot = serde_json::from_str(payload)?;
        let mut data = Self::new();
        for record in persisted.securities {
            let id = record.info.id.clone();
            data.add_security(record.info)?;
            for bar in record.bars {
                data.push_bar(&id, bar)?;
            }
        }
        Ok(data)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let persisted = PersistedSnapshot {
            securities: self.records.values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&persisted)?)
    }

    pub fn add_security(&mut self, info: SecurityInfo) -> Result<()> {
        if self.records.contains_key(&info.id) {
            return Err(EngineError::MarketData(format!(
                "duplicate security {}",
                info.id
            )));
        }
        self.records.insert(
            info.id.clone(),
            SecurityRecord {
                info,
                bars: Vec::new(),
            },
        );
        Ok(())
    }

    /// Append one bar. Price series are append-only: dates must strictly increase.
    pub fn push_bar(&mut self, security: &SecurityId, bar: PriceBar) -> Result<()> {
        let record = self
            .records
            .get_mut(security)
            .ok_or_else(|| EngineError::MarketData(format!("unknown security {}", security)))?;
        if let Some(last) = record.bars.last() {
            if bar.date <= last.date {
                return Err(EngineError::MarketData(format!(
                    "{}: bar {} is not after {}",
                    security, bar.date, last.date
                )));
            }
        }
        record.bars.push(bar);
        Ok(())
    }

    /// Convenience for building fixtures: one security with a close series on
    /// consecutive calendar days ending at `last_date`.
    pub fn add_series(
        &mut self,
        info: SecurityInfo,
        last_date: NaiveDate,
        closes: &[f64],
        volume: f64,
    ) -> Result<()> {
        let id = info.id.clone();
        self.add_security(info)?;
        let n = closes.len() as i64;
        for (i, close) in closes.iter().enumerate() {
            let date = last_date - chrono::Duration::days(n - 1 - i as i64);
            self.push_bar(
                &id,
                PriceBar {
                    date,
                    close: *close,
                    volume,
                },
            )?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MarketDataFeed for InMemoryMarketData {
    fn list_securities(&self, as_of: NaiveDate) -> Result<Vec<SecurityInfo>> {
        Ok(self
            .records
            .values()
            .filter(|r| r.bars.first().is_some_and(|b| b.date <= as_of))
            .map(|r| r.info.clone())
            .collect())
    }

    fn get_price_history(
        &self,
        security: &SecurityId,
        as_of: NaiveDate,
        days: usize,
    ) -> Result<Vec<PriceBar>> {
        let record = self
            .records
            .get(security)
            .ok_or_else(|| EngineError::MarketData(format!("unknown security {}", security)))?;
        let end = record.bars.partition_point(|b| b.date <= as_of);
        let start = end.saturating_sub(days);
        Ok(record.bars[start..end].to_vec())
    }
}
