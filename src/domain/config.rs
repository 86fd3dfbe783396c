//! Typed desk configuration and the wiring derived from it.

use std::path::PathBuf;

use super::consensus::ConsensusConfig;
use super::cycle::{Candidate, CyclePlan};
use super::ethics::{DEFAULT_MIN_SCORE, EthicalFilter};
use super::guardrail::{Guardrail, GuardrailConfig};
use super::ledger::LedgerConfig;
use super::oracle::{LlmOracle, MovingAverageOracle, Oracle, RandomizedOracle, RegimeOracle};
use super::outlook::MacroOutlook;
use super::regime::{RegimeClassifier, RegimeConfig};
use super::scheduler::ScheduleConfig;
use super::training::{EthicsSession, RegimeSession, TrainingPlan};
use crate::ports::judge_port::JudgePort;

/// Period filters understood by the price source.
pub const PERIODS: [&str; 7] = ["5d", "1mo", "3mo", "6mo", "1y", "5y", "max"];

#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub llm: String,
    pub regime: String,
    pub aggressive: String,
    pub conservative: String,
    pub seed: u64,
    pub crossover: bool,
    pub crossover_name: String,
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            llm: "Claude".to_string(),
            regime: "Medallion".to_string(),
            aggressive: "Alpha".to_string(),
            conservative: "Gamma".to_string(),
            seed: 42,
            crossover: false,
            crossover_name: "Crossover".to_string(),
            short_window: 5,
            long_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub price_dir: PathBuf,
    pub news_dir: PathBuf,
    pub period: String,
    pub interval: String,
    pub news_categories: Vec<String>,
    pub output: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            price_dir: PathBuf::from("data/prices"),
            news_dir: PathBuf::from("data/news"),
            period: "1mo".to_string(),
            interval: "1d".to_string(),
            news_categories: vec!["business".to_string(), "market".to_string()],
            output: PathBuf::from("run_state.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeskConfig {
    pub ledger: LedgerConfig,
    pub guardrail: GuardrailConfig,
    /// Adds universe symbols failing ethical screening to the restricted list.
    pub ethical_screen: bool,
    pub ethics_min_score: u32,
    pub consensus: ConsensusConfig,
    pub regime: RegimeConfig,
    pub oracles: OracleConfig,
    pub outlook: MacroOutlook,
    pub data: DataConfig,
    pub universe: Vec<Candidate>,
    pub schedule: ScheduleConfig,
    pub training: TrainingPlan,
}

pub fn default_universe() -> Vec<Candidate> {
    [
        ("AAPL", "STOCKS"),
        ("EQNR.OL", "STOCKS"),
        ("DNB.OL", "STOCKS"),
        ("EURNOK=X", "FOREX"),
        ("USDNOK=X", "FOREX"),
        ("BTC-USD", "CRYPTO"),
        ("ETH-USD", "CRYPTO"),
        ("^TNX", "BONDS"),
    ]
    .into_iter()
    .map(|(s, c)| Candidate::new(s, c))
    .collect()
}

pub fn default_training_symbols() -> Vec<String> {
    ["AAPL", "BTC-USD", "USDNOK=X", "^TNX"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for DeskConfig {
    fn default() -> Self {
        DeskConfig {
            ledger: LedgerConfig::default(),
            guardrail: GuardrailConfig::default(),
            ethical_screen: true,
            ethics_min_score: DEFAULT_MIN_SCORE,
            consensus: ConsensusConfig::default(),
            regime: RegimeConfig::default(),
            oracles: OracleConfig::default(),
            outlook: MacroOutlook::default(),
            data: DataConfig::default(),
            universe: default_universe(),
            schedule: ScheduleConfig::default(),
            training: TrainingPlan {
                symbols: default_training_symbols(),
                ..TrainingPlan::default()
            },
        }
    }
}

impl DeskConfig {
    pub fn oracle_count(&self) -> usize {
        if self.oracles.crossover { 5 } else { 4 }
    }

    pub fn ethical_filter(&self) -> EthicalFilter {
        EthicalFilter::new(Default::default(), self.ethics_min_score)
    }

    /// Guardrail with the configured restricted list, extended by ethical
    /// screening of the universe when enabled.
    pub fn guardrail(&self) -> Guardrail {
        let mut config = self.guardrail.clone();
        if self.ethical_screen {
            let filter = self.ethical_filter();
            config
                .restricted
                .extend(filter.restricted(self.universe.iter().map(|c| c.symbol.as_str())));
        }
        Guardrail::new(config)
    }

    pub fn classifier(&self) -> RegimeClassifier {
        RegimeClassifier::new(self.regime.clone())
    }

    /// LLM, regime and both randomized oracles, plus the crossover oracle when
    /// enabled. Randomized oracles get distinct seeds derived from the base.
    pub fn oracles(&self, judge: Box<dyn JudgePort>) -> Vec<Box<dyn Oracle>> {
        let o = &self.oracles;
        let mut oracles: Vec<Box<dyn Oracle>> = vec![
            Box::new(LlmOracle::new(o.llm.clone(), judge)),
            Box::new(RegimeOracle::new(o.regime.clone(), self.classifier())),
            Box::new(RandomizedOracle::aggressive(o.aggressive.clone(), o.seed)),
            Box::new(RandomizedOracle::conservative(
                o.conservative.clone(),
                o.seed.wrapping_add(1),
            )),
        ];
        if o.crossover {
            oracles.push(Box::new(MovingAverageOracle::new(
                o.crossover_name.clone(),
                o.short_window,
                o.long_window,
            )));
        }
        oracles
    }

    pub fn cycle_plan(&self) -> CyclePlan {
        CyclePlan {
            candidates: self.universe.clone(),
            period: self.data.period.clone(),
            interval: self.data.interval.clone(),
            news_categories: self.data.news_categories.clone(),
            outlook: self.outlook.clone(),
        }
    }

    pub fn regime_session(&self) -> RegimeSession {
        RegimeSession {
            classifier: self.classifier(),
        }
    }

    pub fn ethics_session(&self) -> EthicsSession {
        EthicsSession {
            index: Default::default(),
            min_score: self.ethics_min_score,
        }
    }
}
