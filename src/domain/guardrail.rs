//! Pre-trade risk policy.

use std::collections::BTreeSet;

use super::error::GuardrailRejection;

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailConfig {
    pub max_drawdown: f64,
    pub max_position_fraction: f64,
    pub restricted: BTreeSet<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        GuardrailConfig {
            max_drawdown: 0.10,
            max_position_fraction: 0.05,
            restricted: BTreeSet::new(),
        }
    }
}

/// Policy checker consulted before every buy. Its only state is the peak
/// portfolio value seen so far; it never touches the ledger.
#[derive(Debug, Clone)]
pub struct Guardrail {
    config: GuardrailConfig,
    peak: f64,
}

impl Guardrail {
    pub fn new(config: GuardrailConfig) -> Self {
        Guardrail { config, peak: 0.0 }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Fractional distance of `current_value` below the recorded peak.
    pub fn drawdown(&self, current_value: f64) -> f64 {
        if self.peak <= 0.0 {
            0.0
        } else {
            (self.peak - current_value) / self.peak
        }
    }

    /// Checks drawdown, then sizing, then restriction. The peak is raised
    /// before any check, so it moves even when the trade is rejected.
    pub fn check_trade(
        &mut self,
        current_value: f64,
        proposed_cost: f64,
        symbol: &str,
    ) -> Result<(), GuardrailRejection> {
        if current_value > self.peak {
            self.peak = current_value;
        }

        let drawdown = self.drawdown(current_value);
        if drawdown > self.config.max_drawdown {
            return Err(GuardrailRejection::DrawdownExceeded {
                drawdown,
                limit: self.config.max_drawdown,
            });
        }

        let max_cost = current_value * self.config.max_position_fraction;
        if proposed_cost > max_cost {
            return Err(GuardrailRejection::PositionTooLarge {
                cost: proposed_cost,
                max_cost,
                fraction: self.config.max_position_fraction,
            });
        }

        if self.config.restricted.contains(symbol) {
            return Err(GuardrailRejection::RestrictedAsset {
                symbol: symbol.to_string(),
            });
        }

        Ok(())
    }
}
