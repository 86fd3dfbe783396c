//! Independent opinion sources ("oracles") polled by the consensus layer.
//!
//! Every oracle always produces a vote. When its real source fails it falls
//! back to a local heuristic and says so through [`OracleVote::Fallback`], so
//! the number of voters per candidate never changes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::OracleError;
use super::indicator::sma_at;
use super::regime::{RegimeClassifier, RegimeLabel};
use super::vote::{Judgement, OracleVote, Vote};
use crate::ports::judge_port::JudgePort;

/// Number of most recent prices handed to the external judge.
pub const JUDGE_LOOKBACK: usize = 5;

/// What an oracle sees for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    pub symbol: &'a str,
    pub prices: &'a [f64],
    pub sentiment: f64,
}

/// Used to attribute a trade to the oracle that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleRole {
    Regime,
    Sentiment,
    Heuristic,
}

pub trait Oracle {
    fn name(&self) -> &str;

    fn role(&self) -> OracleRole {
        OracleRole::Heuristic
    }

    /// Randomized oracles are excluded from reproducibility guarantees.
    fn is_randomized(&self) -> bool {
        false
    }

    fn vote(&mut self, ctx: &MarketContext<'_>) -> OracleVote;
}

/// Local fallback used when the judge is unavailable.
pub fn sentiment_heuristic(sentiment: f64) -> Judgement {
    let confidence = if sentiment.abs() > 0.2 { 0.6 } else { 0.4 };
    let action = if sentiment > 0.05 {
        Vote::Buy
    } else if sentiment < -0.05 {
        Vote::Sell
    } else {
        Vote::Hold
    };
    Judgement {
        action,
        confidence,
        reasoning: format!(
            "heuristic fallback, sentiment magnitude {:.3}",
            sentiment.abs()
        ),
    }
}

/// Asks an external judge, falling back to the sentiment heuristic.
pub struct LlmOracle {
    name: String,
    judge: Box<dyn JudgePort>,
}

impl LlmOracle {
    pub fn new(name: impl Into<String>, judge: Box<dyn JudgePort>) -> Self {
        LlmOracle {
            name: name.into(),
            judge,
        }
    }

    fn ask(&self, ctx: &MarketContext<'_>) -> Result<Judgement, OracleError> {
        let start = ctx.prices.len().saturating_sub(JUDGE_LOOKBACK);
        let judgement = self.judge.judge(&ctx.prices[start..], ctx.sentiment)?;
        if !(0.0..=1.0).contains(&judgement.confidence) {
            return Err(OracleError::Malformed {
                oracle: self.name.clone(),
                reason: format!("confidence {} outside [0, 1]", judgement.confidence),
            });
        }
        Ok(judgement)
    }
}

impl Oracle for LlmOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> OracleRole {
        OracleRole::Sentiment
    }

    fn vote(&mut self, ctx: &MarketContext<'_>) -> OracleVote {
        match self.ask(ctx) {
            Ok(j) => OracleVote::Cast {
                vote: j.action,
                confidence: Some(j.confidence),
            },
            Err(err) => OracleVote::Fallback {
                vote: sentiment_heuristic(ctx.sentiment).action,
                reason: err.to_string(),
            },
        }
    }
}

/// Buys in a Stable-Growth regime, holds otherwise.
pub struct RegimeOracle {
    name: String,
    classifier: RegimeClassifier,
}

impl RegimeOracle {
    pub fn new(name: impl Into<String>, classifier: RegimeClassifier) -> Self {
        RegimeOracle {
            name: name.into(),
            classifier,
        }
    }
}

impl Oracle for RegimeOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> OracleRole {
        OracleRole::Regime
    }

    fn vote(&mut self, ctx: &MarketContext<'_>) -> OracleVote {
        let estimate = self.classifier.classify(ctx.prices);
        let vote = if estimate.label == RegimeLabel::StableGrowth {
            Vote::Buy
        } else {
            Vote::Hold
        };
        match estimate.fallback {
            Some(err) => OracleVote::Fallback {
                vote,
                reason: err.to_string(),
            },
            None => OracleVote::cast(vote),
        }
    }
}

/// Short/long simple moving average crossover on the latest bar.
pub struct MovingAverageOracle {
    name: String,
    short_window: usize,
    long_window: usize,
}

impl MovingAverageOracle {
    pub fn new(name: impl Into<String>, short_window: usize, long_window: usize) -> Self {
        MovingAverageOracle {
            name: name.into(),
            short_window,
            long_window,
        }
    }
}

impl Oracle for MovingAverageOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn vote(&mut self, ctx: &MarketContext<'_>) -> OracleVote {
        let n = ctx.prices.len();
        let crossover = if n > self.long_window {
            let p = ctx.prices;
            sma_at(p, self.short_window, n - 1)
                .zip(sma_at(p, self.long_window, n - 1))
                .zip(sma_at(p, self.short_window, n - 2).zip(sma_at(p, self.long_window, n - 2)))
        } else {
            None
        };

        let Some(((short_now, long_now), (short_prev, long_prev))) = crossover else {
            return OracleVote::Fallback {
                vote: Vote::Hold,
                reason: format!("need more than {} prices, got {n}", self.long_window),
            };
        };

        let vote = if short_now > long_now && short_prev <= long_prev {
            Vote::Buy
        } else if short_now < long_now && short_prev >= long_prev {
            Vote::Sell
        } else {
            Vote::Hold
        };
        OracleVote::cast(vote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperament {
    /// BUY with probability 0.6, else HOLD.
    Aggressive,
    /// HOLD with probability 0.7, else SELL.
    Conservative,
}

/// Seeded coin-flip oracle standing in for models without a real signal.
pub struct RandomizedOracle {
    name: String,
    temperament: Temperament,
    rng: StdRng,
}

impl RandomizedOracle {
    pub fn new(name: impl Into<String>, temperament: Temperament, seed: u64) -> Self {
        RandomizedOracle {
            name: name.into(),
            temperament,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn aggressive(name: impl Into<String>, seed: u64) -> Self {
        RandomizedOracle::new(name, Temperament::Aggressive, seed)
    }

    pub fn conservative(name: impl Into<String>, seed: u64) -> Self {
        RandomizedOracle::new(name, Temperament::Conservative, seed)
    }
}

impl Oracle for RandomizedOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_randomized(&self) -> bool {
        true
    }

    fn vote(&mut self, _ctx: &MarketContext<'_>) -> OracleVote {
        let vote = match self.temperament {
            Temperament::Aggressive => {
                if self.rng.gen_bool(0.6) {
                    Vote::Buy
                } else {
                    Vote::Hold
                }
            }
            Temperament::Conservative => {
                if self.rng.gen_bool(0.7) {
                    Vote::Hold
                } else {
                    Vote::Sell
                }
            }
        };
        OracleVote::cast(vote)
    }
}
