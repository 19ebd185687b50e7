use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::cross_section::TargetWeights;
use super::security::SecurityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Weight change needed to move one name from its live position to target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDelta {
    pub security: SecurityId,
    pub side: OrderSide,
    pub current_weight: f64,
    pub target_weight: f64,
    pub delta_weight: f64,
}

/// Everything the execution sink receives for one rebalance cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub cycle_id: String,
    pub as_of: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub targets: TargetWeights,
    pub deltas: Vec<OrderDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub cycle_id: String,
    pub accepted_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejection {
    pub cycle_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Ack(OrderAck),
    Rejected(OrderRejection),
}
