//! Statistical regime classification from a price series.

pub mod hmm;
pub mod pairs;
pub mod pattern;

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::FitError;
use hmm::{FitOptions, GaussianHmm, STATES};

pub use pairs::{DEFAULT_PAIRS_WINDOW, is_entry_signal, pairs_zscore};
pub use pattern::{DEFAULT_PATTERN_WINDOW, pattern_forecast};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeLabel {
    #[serde(rename = "Stable-Growth")]
    StableGrowth,
    #[serde(rename = "Neutral-Choppy")]
    NeutralChoppy,
    #[serde(rename = "High-Risk-Crash")]
    HighRiskCrash,
}

impl RegimeLabel {
    /// Labels in ascending order of volatility.
    pub const BY_VOLATILITY: [RegimeLabel; STATES] = [
        RegimeLabel::StableGrowth,
        RegimeLabel::NeutralChoppy,
        RegimeLabel::HighRiskCrash,
    ];
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeLabel::StableGrowth => f.write_str("Stable-Growth"),
            RegimeLabel::NeutralChoppy => f.write_str("Neutral-Choppy"),
            RegimeLabel::HighRiskCrash => f.write_str("High-Risk-Crash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub min_samples: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub pattern_window: usize,
    pub pairs_window: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            min_samples: 10,
            max_iterations: 100,
            tolerance: 0.01,
            pattern_window: DEFAULT_PATTERN_WINDOW,
            pairs_window: DEFAULT_PAIRS_WINDOW,
        }
    }
}

/// Classification result. `states` holds one label per usable return; it is
/// empty when too few returns were available or the fit failed, in which case
/// `fallback` carries the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeEstimate {
    pub label: RegimeLabel,
    pub states: Vec<RegimeLabel>,
    pub fallback: Option<FitError>,
}

/// Log returns of consecutive prices, dropping non-finite values.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        RegimeClassifier { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn classify(&self, prices: &[f64]) -> RegimeEstimate {
        let returns = log_returns(prices);
        if returns.len() < self.config.min_samples {
            return RegimeEstimate {
                label: RegimeLabel::StableGrowth,
                states: Vec::new(),
                fallback: None,
            };
        }

        let options = FitOptions {
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
        };
        match GaussianHmm::fit(&returns, options) {
            Ok(model) => {
                let mut label_of = [RegimeLabel::NeutralChoppy; STATES];
                for (rank, state) in model.states_by_variance().into_iter().enumerate() {
                    label_of[state] = RegimeLabel::BY_VOLATILITY[rank];
                }
                let states: Vec<RegimeLabel> = model
                    .viterbi(&returns)
                    .into_iter()
                    .map(|s| label_of[s])
                    .collect();
                let label = states.last().copied().unwrap_or(RegimeLabel::NeutralChoppy);
                RegimeEstimate {
                    label,
                    states,
                    fallback: None,
                }
            }
            Err(err) => RegimeEstimate {
                label: RegimeLabel::NeutralChoppy,
                states: Vec::new(),
                fallback: Some(err),
            },
        }
    }

    pub fn forecast(&self, prices: &[f64]) -> f64 {
        pattern_forecast(prices, self.config.pattern_window)
    }

    pub fn pairs_zscore(&self, a: &[f64], b: &[f64]) -> Option<f64> {
        pairs_zscore(a, b, self.config.pairs_window)
    }
}
