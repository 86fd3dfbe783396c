//! Macro outlook: a heuristic volatility regime and directional bias derived
//! from a position within a long macro cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CYCLE_PERCENTILE: f64 = 87.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityRegime {
    Low,
    Moderate,
    High,
    Extreme,
}

impl VolatilityRegime {
    /// HIGH and EXTREME call for the elevated quorum.
    pub fn is_elevated(&self) -> bool {
        matches!(self, VolatilityRegime::High | VolatilityRegime::Extreme)
    }

    pub fn parse(s: &str) -> Option<VolatilityRegime> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(VolatilityRegime::Low),
            "MODERATE" => Some(VolatilityRegime::Moderate),
            "HIGH" => Some(VolatilityRegime::High),
            "EXTREME" => Some(VolatilityRegime::Extreme),
            _ => None,
        }
    }
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VolatilityRegime::Low => "LOW",
            VolatilityRegime::Moderate => "MODERATE",
            VolatilityRegime::High => "HIGH",
            VolatilityRegime::Extreme => "EXTREME",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketBias {
    Bullish,
    Neutral,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Early,
    Mid,
    Late,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroOutlook {
    pub cycle_percentile: f64,
    pub phase: CyclePhase,
    pub volatility: VolatilityRegime,
    pub short_term_bias: MarketBias,
    pub medium_term_bias: MarketBias,
}

impl MacroOutlook {
    pub fn heuristic(cycle_percentile: f64) -> MacroOutlook {
        let (phase, volatility, short_term_bias, medium_term_bias) = if cycle_percentile >= 85.0 {
            (
                CyclePhase::Late,
                VolatilityRegime::High,
                MarketBias::Neutral,
                MarketBias::Bearish,
            )
        } else if cycle_percentile >= 70.0 {
            (
                CyclePhase::Mid,
                VolatilityRegime::Moderate,
                MarketBias::Bullish,
                MarketBias::Neutral,
            )
        } else {
            (
                CyclePhase::Early,
                VolatilityRegime::Low,
                MarketBias::Bullish,
                MarketBias::Bullish,
            )
        };
        MacroOutlook {
            cycle_percentile,
            phase,
            volatility,
            short_term_bias,
            medium_term_bias,
        }
    }

    /// Heuristic outlook, with `volatility` replaced when one is configured.
    pub fn resolve(cycle_percentile: f64, volatility: Option<VolatilityRegime>) -> MacroOutlook {
        let mut outlook = MacroOutlook::heuristic(cycle_percentile);
        if let Some(v) = volatility {
            outlook.volatility = v;
        }
        outlook
    }
}

impl Default for MacroOutlook {
    fn default() -> Self {
        MacroOutlook::heuristic(DEFAULT_CYCLE_PERCENTILE)
    }
}
