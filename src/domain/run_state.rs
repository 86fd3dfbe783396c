//! End-of-cycle snapshot handed to the run state writer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::consensus::SymbolOutcome;
use super::ledger::{Ledger, SizeTier};
use super::outlook::MacroOutlook;
use super::position::{Position, TradeRecord};
use super::vote::DecisionMatrix;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub total_value: f64,
    pub cash: f64,
    pub initial: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub tier: SizeTier,
    pub positions: Vec<Position>,
}

/// One line of the per-symbol decision audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionAudit {
    pub symbol: String,
    pub category: String,
    pub matrix: DecisionMatrix,
    pub trigger: Option<String>,
    pub outcome: &'static str,
    pub detail: String,
    /// Votes in `matrix` that a rerun would not reproduce.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub randomized: Vec<String>,
}

impl From<&SymbolOutcome> for DecisionAudit {
    fn from(outcome: &SymbolOutcome) -> Self {
        DecisionAudit {
            symbol: outcome.symbol.clone(),
            category: outcome.category.clone(),
            matrix: outcome.matrix.clone(),
            trigger: outcome.trigger.clone(),
            outcome: outcome.decision.label(),
            detail: outcome.decision.to_string(),
            randomized: outcome.randomized.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub generated_at: DateTime<Utc>,
    pub portfolio: PortfolioSnapshot,
    pub trade_history: Vec<TradeRecord>,
    pub current_prices: BTreeMap<String, f64>,
    pub news_headlines: Vec<String>,
    /// Average weighted headline sentiment scaled by 100.
    pub sentiment_mood: f64,
    pub macro_outlook: MacroOutlook,
    pub decisions: Vec<DecisionAudit>,
}

/// Market-side inputs of a snapshot.
pub struct CycleView<'a> {
    pub price_map: &'a HashMap<String, f64>,
    pub headlines: &'a [String],
    pub sentiment: f64,
    pub outlook: &'a MacroOutlook,
    pub outcomes: &'a [SymbolOutcome],
}

impl RunState {
    pub fn capture(ledger: &Ledger, view: &CycleView<'_>, generated_at: DateTime<Utc>) -> Self {
        let status = ledger.status(view.price_map);
        RunState {
            generated_at,
            portfolio: PortfolioSnapshot {
                total_value: status.total_value,
                cash: ledger.cash(),
                initial: ledger.initial_cash(),
                total_commission: ledger.total_commission(),
                total_slippage: ledger.total_slippage(),
                tier: status.tier,
                positions: ledger.positions().cloned().collect(),
            },
            trade_history: ledger.history().to_vec(),
            current_prices: view
                .price_map
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            news_headlines: view.headlines.to_vec(),
            sentiment_mood: view.sentiment * 100.0,
            macro_outlook: view.outlook.clone(),
            decisions: view.outcomes.iter().map(DecisionAudit::from).collect(),
        }
    }
}
