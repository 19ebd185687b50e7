use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable, unique key of a tradable equity (e.g. a ticker or vendor id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SecurityId(String);

impl SecurityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SecurityId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<SecurityId> for String {
    fn from(value: SecurityId) -> Self {
        value.0
    }
}

impl From<&str> for SecurityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Listing and tradability metadata published by the market-data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub id: SecurityId,
    #[serde(default)]
    pub halted: bool,
    #[serde(default = "default_primary_share")]
    pub primary_share: bool,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

fn default_primary_share() -> bool {
    true
}

impl SecurityInfo {
    pub fn new(id: impl Into<SecurityId>) -> Self {
        Self {
            id: id.into(),
            halted: false,
            primary_share: true,
            market_cap: None,
        }
    }
}

/// One trading day of adjusted close and share volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    pub fn dollar_volume(&self) -> f64 {
        self.close * self.volume
    }
}
