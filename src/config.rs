use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;

use crate::controller::RebalancePipeline;
use crate::factor::FactorEngine;
use crate::optimizer::{ConstraintSet, PortfolioOptimizer};
use crate::schedule::{RebalanceSchedule, MAX_DAYS_OFFSET};
use crate::selection::SelectionPolicy;
use crate::universe::{UniverseFilter, UniverseFilterConfig};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub universe: UniverseFilterConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub returns_lookback_days: usize,
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            returns_lookback_days: 10,
            low_percentile: 5.0,
            high_percentile: 95.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_gross_exposure: f64,
    pub max_position_concentration: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_gross_exposure: 2.0,
            max_position_concentration: 0.01,
        }
    }
}

impl RiskConfig {
    pub fn constraint_set(&self) -> ConstraintSet {
        ConstraintSet::mean_reversion(self.max_gross_exposure, self.max_position_concentration)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Weekdays after the start of the week (0 = first session).
    pub days_offset: u32,
    pub hours: u32,
    pub minutes: u32,
    /// Exchange open, `HH:MM`.
    pub market_open: String,
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            days_offset: 0,
            hours: 1,
            minutes: 30,
            market_open: "09:30".to_string(),
            poll_interval_secs: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn offset_minutes(&self) -> i64 {
        self.hours as i64 * 60 + self.minutes as i64
    }

    pub fn to_schedule(&self) -> Result<RebalanceSchedule> {
        if self.days_offset > MAX_DAYS_OFFSET {
            bail!(
                "schedule.days_offset {} is past the trading week (max {})",
                self.days_offset,
                MAX_DAYS_OFFSET
            );
        }
        let open = NaiveTime::parse_from_str(self.market_open.trim(), "%H:%M").with_context(
            || format!("invalid schedule.market_open '{}': expected HH:MM", self.market_open),
        )?;
        Ok(RebalanceSchedule::weekly(
            self.days_offset,
            open,
            chrono::Duration::minutes(self.offset_minutes()),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub snapshot_path: PathBuf,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/market_snapshot.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub min_weight_delta: f64,
    pub journal_path: PathBuf,
    pub positions_path: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_weight_delta: 1e-6,
            journal_path: PathBuf::from("data/rebalance_journal.jsonl"),
            positions_path: PathBuf::from("data/positions.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Read `RQ_CONFIG_PATH` (default `config/default.toml`), apply environment
    /// overrides, and validate.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("RQ_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Apply `MAX_GROSS_EXPOSURE`, `MAX_POSITION_CONCENTRATION` and
    /// `RETURNS_LOOKBACK_DAYS` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("MAX_GROSS_EXPOSURE") {
            self.risk.max_gross_exposure = v
                .trim()
                .parse()
                .with_context(|| format!("MAX_GROSS_EXPOSURE '{}' is not a number", v))?;
        }
        if let Some(v) = lookup("MAX_POSITION_CONCENTRATION") {
            self.risk.max_position_concentration = v
                .trim()
                .parse()
                .with_context(|| format!("MAX_POSITION_CONCENTRATION '{}' is not a number", v))?;
        }
        if let Some(v) = lookup("RETURNS_LOOKBACK_DAYS") {
            self.strategy.returns_lookback_days = v
                .trim()
                .parse()
                .with_context(|| format!("RETURNS_LOOKBACK_DAYS '{}' is not an integer", v))?;
        }
        Ok(())
    }

    /// Structural checks only. Risk limits that no portfolio can satisfy are
    /// left for the optimizer to report as infeasible.
    pub fn validate(&self) -> Result<()> {
        if self.strategy.returns_lookback_days == 0 {
            bail!("strategy.returns_lookback_days must be > 0");
        }
        SelectionPolicy::new(self.strategy.low_percentile, self.strategy.high_percentile)
            .context("strategy percentiles are invalid")?;
        if !self.risk.max_gross_exposure.is_finite()
            || !self.risk.max_position_concentration.is_finite()
        {
            bail!("risk limits must be finite numbers");
        }
        if self.schedule.days_offset > MAX_DAYS_OFFSET {
            bail!(
                "schedule.days_offset must be in [0, {}], got {}",
                MAX_DAYS_OFFSET,
                self.schedule.days_offset
            );
        }
        if self.schedule.offset_minutes() >= 24 * 60 {
            bail!(
                "schedule offset {}h{}m must be less than a day",
                self.schedule.hours,
                self.schedule.minutes
            );
        }
        self.schedule.to_schedule()?;
        if !(self.execution.min_weight_delta >= 0.0) {
            bail!("execution.min_weight_delta must be >= 0");
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Result<RebalancePipeline> {
        let selection =
            SelectionPolicy::new(self.strategy.low_percentile, self.strategy.high_percentile)
                .context("strategy percentiles are invalid")?;
        Ok(RebalancePipeline {
            universe: UniverseFilter::new(self.universe.clone()),
            factors: FactorEngine::new(self.strategy.returns_lookback_days),
            selection,
            optimizer: PortfolioOptimizer::new(),
            constraints: self.risk.constraint_set(),
            min_weight_delta: self.execution.min_weight_delta,
        })
    }
}
