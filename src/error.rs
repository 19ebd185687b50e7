use thiserror::Error;

use crate::model::security::SecurityId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("degenerate cross-section: {valid} valid factor values, std dev {std_dev:e}")]
    DegenerateCrossSection { valid: usize, std_dev: f64 },

    #[error("alpha vector is empty: no securities selected")]
    EmptyAlpha,

    #[error("infeasible constraints: {0}")]
    InfeasibleConstraints(String),

    #[error("insufficient history for {security}: need {required} bars, have {available}")]
    InsufficientHistory {
        security: SecurityId,
        required: usize,
        available: usize,
    },

    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Cycle-level conditions the controller absorbs by skipping the rebalance.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            EngineError::DegenerateCrossSection { .. } | EngineError::EmptyAlpha
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
