//! Cash and position ledger.
//!
//! The ledger is the only component that mutates financial state. Every
//! mutation goes through [`Ledger::execute`], which either applies the whole
//! trade (cash, position, history, fee accumulators) or returns an error and
//! leaves the ledger untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::error::LedgerError;
use super::position::{HorizonRules, Position, Side, TradeRecord};
use super::vote::DecisionMatrix;

/// Quantities at or below this are treated as a closed position.
const QTY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub commission_rate: f64,
    pub slippage_rate: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            commission_rate: 0.001,
            slippage_rate: 0.0005,
        }
    }
}

/// Fees charged on one fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeQuote {
    pub notional: f64,
    pub commission: f64,
    pub slippage: f64,
}

impl FeeQuote {
    pub fn fees(&self) -> f64 {
        self.commission + self.slippage
    }

    /// Cash needed to open the fill: notional plus fees.
    pub fn total_cost(&self) -> f64 {
        self.notional + self.fees()
    }
}

impl FeeSchedule {
    pub fn quote(&self, quantity: f64, price: f64) -> FeeQuote {
        let notional = quantity * price;
        FeeQuote {
            notional,
            commission: notional * self.commission_rate,
            slippage: notional * self.slippage_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub initial_cash: f64,
    pub fees: FeeSchedule,
    pub horizons: HorizonRules,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_cash: 20_000.0,
            fees: FeeSchedule::default(),
            horizons: HorizonRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub category: String,
    pub trigger: String,
    /// Matched by the horizon rules; never carries an oracle name.
    pub trigger_kind: String,
    pub decision: DecisionMatrix,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

impl SizeTier {
    pub fn for_endowment(initial_cash: f64) -> SizeTier {
        if initial_cash <= 20_000.0 {
            SizeTier::Small
        } else if initial_cash <= 200_000.0 {
            SizeTier::Medium
        } else {
            SizeTier::Large
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeTier::Small => f.write_str("SMALL"),
            SizeTier::Medium => f.write_str("MEDIUM"),
            SizeTier::Large => f.write_str("LARGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStatus {
    pub tier: SizeTier,
    pub cash: f64,
    pub total_value: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    cash: f64,
    initial_cash: f64,
    positions: BTreeMap<String, Position>,
    history: Vec<TradeRecord>,
    total_commission: f64,
    total_slippage: f64,
    fees: FeeSchedule,
    horizons: HorizonRules,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Ledger {
            cash: config.initial_cash,
            initial_cash: config.initial_cash,
            positions: BTreeMap::new(),
            history: Vec::new(),
            total_commission: 0.0,
            total_slippage: 0.0,
            fees: config.fees,
            horizons: config.horizons,
        }
    }

    pub fn with_cash(initial_cash: f64) -> Self {
        Ledger::new(LedgerConfig {
            initial_cash,
            ..LedgerConfig::default()
        })
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn total_slippage(&self) -> f64 {
        self.total_slippage
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    /// Cash plus every position valued at its price in `price_map`, or at its
    /// average cost when no price is known.
    pub fn portfolio_value(&self, price_map: &HashMap<String, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map.get(&pos.symbol).copied().unwrap_or(pos.avg_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + holdings
    }

    pub fn status(&self, price_map: &HashMap<String, f64>) -> LedgerStatus {
        LedgerStatus {
            tier: SizeTier::for_endowment(self.initial_cash),
            cash: self.cash,
            total_value: self.portfolio_value(price_map),
            open_positions: self.positions.len(),
        }
    }

    pub fn execute(&mut self, order: TradeOrder) -> Result<TradeRecord, LedgerError> {
        validate_order(&order)?;
        let quote = self.fees.quote(order.quantity, order.price);

        let realized = match order.side {
            Side::Buy => self.apply_buy(&order, &quote)?,
            Side::Sell => self.apply_sell(&order, &quote)?,
        };

        self.total_commission += quote.commission;
        self.total_slippage += quote.slippage;

        let record = TradeRecord {
            timestamp: order.timestamp,
            symbol: order.symbol,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            realized,
            commission: quote.commission,
            slippage: quote.slippage,
            fees: quote.fees(),
            trigger: order.trigger,
            decision: order.decision,
            cash_after: self.cash,
        };
        self.history.push(record.clone());
        Ok(record)
    }

    fn apply_buy(&mut self, order: &TradeOrder, quote: &FeeQuote) -> Result<f64, LedgerError> {
        let required = quote.total_cost();
        if required > self.cash {
            return Err(LedgerError::InsufficientFunds {
                required,
                available: self.cash,
            });
        }
        self.cash -= required;

        let horizon = self.horizons.horizon_for(&order.trigger_kind);
        let pos = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position {
                symbol: order.symbol.clone(),
                quantity: 0.0,
                avg_price: order.price,
                category: order.category.clone(),
                trigger: order.trigger.clone(),
                decision: order.decision.clone(),
                horizon,
                opened_at: order.timestamp,
            });
        let new_qty = pos.quantity + order.quantity;
        pos.avg_price = (pos.quantity * pos.avg_price + quote.notional) / new_qty;
        pos.quantity = new_qty;
        Ok(0.0)
    }

    fn apply_sell(&mut self, order: &TradeOrder, quote: &FeeQuote) -> Result<f64, LedgerError> {
        let held = self
            .positions
            .get(&order.symbol)
            .map(|p| p.quantity)
            .unwrap_or(0.0);
        if held < order.quantity {
            return Err(LedgerError::InsufficientHoldings {
                symbol: order.symbol.clone(),
                requested: order.quantity,
                held,
            });
        }

        let mut closed = false;
        let mut realized = 0.0;
        if let Some(pos) = self.positions.get_mut(&order.symbol) {
            realized = (order.price - pos.avg_price) * order.quantity - quote.fees();
            pos.quantity -= order.quantity;
            closed = pos.quantity <= QTY_EPSILON;
        }
        if closed {
            self.positions.remove(&order.symbol);
        }
        self.cash += quote.notional - quote.fees();
        Ok(realized)
    }
}

fn validate_order(order: &TradeOrder) -> Result<(), LedgerError> {
    let reason = if !order.quantity.is_finite() || order.quantity <= 0.0 {
        format!("quantity must be positive, got {}", order.quantity)
    } else if !order.price.is_finite() || order.price <= 0.0 {
        format!("price must be positive, got {}", order.price)
    } else {
        return Ok(());
    };
    Err(LedgerError::InvalidOrder {
        symbol: order.symbol.clone(),
        reason,
    })
}
