//! Open positions, trade records and holding-horizon rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::vote::DecisionMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Expected holding period of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub fn parse(s: &str) -> Option<Horizon> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Some(Horizon::Short),
            "medium" => Some(Horizon::Medium),
            "long" => Some(Horizon::Long),
            _ => None,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Short => f.write_str("short"),
            Horizon::Medium => f.write_str("medium"),
            Horizon::Long => f.write_str("long"),
        }
    }
}

/// Keyword rules mapping a trigger attribution to a holding horizon.
///
/// Rules are checked in order; the first keyword contained (case-insensitively)
/// in the attribution wins.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonRules {
    rules: Vec<(String, Horizon)>,
    default: Horizon,
}

impl HorizonRules {
    pub fn new(rules: Vec<(String, Horizon)>, default: Horizon) -> Self {
        let rules = rules
            .into_iter()
            .map(|(k, h)| (k.to_ascii_lowercase(), h))
            .collect();
        HorizonRules { rules, default }
    }

    pub fn horizon_for(&self, trigger: &str) -> Horizon {
        let trigger = trigger.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| trigger.contains(keyword.as_str()))
            .map(|(_, h)| *h)
            .unwrap_or(self.default)
    }

    /// Regime-triggered trades are short term, sentiment-triggered ones long.
    pub fn default_rules() -> Vec<(String, Horizon)> {
        vec![
            ("regime".to_string(), Horizon::Short),
            ("sentiment".to_string(), Horizon::Long),
        ]
    }
}

impl Default for HorizonRules {
    fn default() -> Self {
        HorizonRules::new(HorizonRules::default_rules(), Horizon::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
    pub category: String,
    pub trigger: String,
    pub decision: DecisionMatrix,
    pub horizon: Horizon,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_price)
    }
}

/// One executed trade. Records are appended to the ledger history and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Zero for buys; net of fees for sells.
    pub realized: f64,
    pub commission: f64,
    pub slippage: f64,
    pub fees: f64,
    pub trigger: String,
    pub decision: DecisionMatrix,
    pub cash_after: f64,
}
