//! Multi-oracle consensus: collect votes, apply a volatility-adjusted quorum,
//! attribute a trigger, and route approved buys through the guardrail to the
//! ledger.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::error::{GuardrailRejection, LedgerError};
use super::guardrail::Guardrail;
use super::ledger::{Ledger, TradeOrder};
use super::oracle::{MarketContext, Oracle, OracleRole};
use super::outlook::VolatilityRegime;
use super::position::{Side, TradeRecord};
use super::vote::{DecisionMatrix, OracleVote, Vote};
use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumPolicy {
    pub calm: usize,
    pub elevated: usize,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        QuorumPolicy {
            calm: 2,
            elevated: 3,
        }
    }
}

impl QuorumPolicy {
    pub fn required(&self, volatility: VolatilityRegime) -> usize {
        if volatility.is_elevated() {
            self.elevated
        } else {
            self.calm
        }
    }
}

/// Which opinion a trade is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Regime(String),
    Sentiment(String),
    Majority,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Regime(oracle) => write!(f, "{oracle} regime trigger"),
            Trigger::Sentiment(oracle) => write!(f, "{oracle} sentiment trigger"),
            Trigger::Majority => f.write_str("majority consensus"),
        }
    }
}

impl Trigger {
    /// The attribution without the oracle name; horizon rules match on this.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Regime(_) => "regime trigger",
            Trigger::Sentiment(_) => "sentiment trigger",
            Trigger::Majority => "majority consensus",
        }
    }
}

/// Regime BUY beats sentiment BUY beats plain majority. Within a role the
/// first oracle in `roles` wins.
pub fn select_trigger(matrix: &DecisionMatrix, roles: &[(String, OracleRole)]) -> Trigger {
    let buying = |role: OracleRole| {
        roles
            .iter()
            .find(|(name, r)| *r == role && matrix.get(name) == Some(Vote::Buy))
            .map(|(name, _)| name.clone())
    };
    if let Some(name) = buying(OracleRole::Regime) {
        Trigger::Regime(name)
    } else if let Some(name) = buying(OracleRole::Sentiment) {
        Trigger::Sentiment(name)
    } else {
        Trigger::Majority
    }
}

pub fn tally(matrix: &DecisionMatrix) -> usize {
    matrix.count(Vote::Buy)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Skipped { reason: String },
    NoQuorum { buys: usize, required: usize },
    AlreadyHeld,
    Rejected(GuardrailRejection),
    LedgerRejected(LedgerError),
    Executed(TradeRecord),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Skipped { .. } => "skipped",
            Decision::NoQuorum { .. } => "no quorum",
            Decision::AlreadyHeld => "already held",
            Decision::Rejected(_) => "rejected by guardrail",
            Decision::LedgerRejected(_) => "rejected by ledger",
            Decision::Executed(_) => "executed",
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Decision::Executed(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Skipped { reason } => write!(f, "skipped: {reason}"),
            Decision::NoQuorum { buys, required } => {
                write!(f, "no quorum ({buys} of {required} BUY votes)")
            }
            Decision::AlreadyHeld => f.write_str("already held"),
            Decision::Rejected(r) => write!(f, "rejected: {r}"),
            Decision::LedgerRejected(e) => write!(f, "rejected: {e}"),
            Decision::Executed(t) => write!(f, "bought {} @ {:.4}", t.quantity, t.price),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub category: String,
    pub matrix: DecisionMatrix,
    pub trigger: Option<String>,
    pub decision: Decision,
    /// Oracles in `matrix` whose votes are not reproducible across runs.
    pub randomized: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusConfig {
    pub quorum: QuorumPolicy,
    pub trade_quantity: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            quorum: QuorumPolicy::default(),
            trade_quantity: 1.0,
        }
    }
}

/// Everything the engine needs to decide on one candidate.
pub struct Proposal<'a> {
    pub symbol: &'a str,
    pub category: &'a str,
    pub prices: &'a [f64],
    pub sentiment: f64,
    pub volatility: VolatilityRegime,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state the engine may act on.
pub struct Book<'a> {
    pub ledger: &'a mut Ledger,
    pub guardrail: &'a mut Guardrail,
    /// Prices seen so far this cycle, used to value the portfolio.
    pub price_map: &'a HashMap<String, f64>,
}

pub struct ConsensusEngine {
    oracles: Vec<Box<dyn Oracle>>,
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(oracles: Vec<Box<dyn Oracle>>, config: ConsensusConfig) -> Self {
        ConsensusEngine { oracles, config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn roles(&self) -> Vec<(String, OracleRole)> {
        self.oracles
            .iter()
            .map(|o| (o.name().to_string(), o.role()))
            .collect()
    }

    pub fn randomized_oracles(&self) -> Vec<String> {
        self.oracles
            .iter()
            .filter(|o| o.is_randomized())
            .map(|o| o.name().to_string())
            .collect()
    }

    /// Polls every oracle once. Fallback votes are reported to `telemetry`
    /// but still counted.
    pub fn collect(
        &mut self,
        ctx: &MarketContext<'_>,
        telemetry: &dyn TelemetryPort,
    ) -> DecisionMatrix {
        self.oracles
            .iter_mut()
            .map(|oracle| {
                let vote = oracle.vote(ctx);
                if let OracleVote::Fallback { reason, .. } = &vote {
                    telemetry.record(TelemetryEvent::VoteFallback {
                        symbol: ctx.symbol.to_string(),
                        oracle: oracle.name().to_string(),
                        reason: reason.clone(),
                    });
                }
                (oracle.name().to_string(), vote.vote())
            })
            .collect()
    }

    pub fn decide(
        &mut self,
        proposal: &Proposal<'_>,
        book: Book<'_>,
        telemetry: &dyn TelemetryPort,
    ) -> SymbolOutcome {
        let randomized = self.randomized_oracles();
        let outcome = |matrix: DecisionMatrix, trigger: Option<String>, decision: Decision| {
            SymbolOutcome {
                symbol: proposal.symbol.to_string(),
                category: proposal.category.to_string(),
                randomized: randomized
                    .iter()
                    .filter(|name| matrix.get(name).is_some())
                    .cloned()
                    .collect(),
                matrix,
                trigger,
                decision,
            }
        };

        let Some(&price) = proposal.prices.last() else {
            let reason = "empty price series".to_string();
            telemetry.record(TelemetryEvent::SymbolSkipped {
                symbol: proposal.symbol.to_string(),
                reason: reason.clone(),
            });
            return outcome(DecisionMatrix::default(), None, Decision::Skipped { reason });
        };

        let ctx = MarketContext {
            symbol: proposal.symbol,
            prices: proposal.prices,
            sentiment: proposal.sentiment,
        };
        let matrix = self.collect(&ctx, telemetry);

        let buys = tally(&matrix);
        let required = self.config.quorum.required(proposal.volatility);
        if buys < required {
            telemetry.record(TelemetryEvent::QuorumMissed {
                symbol: proposal.symbol.to_string(),
                buys,
                required,
            });
            return outcome(matrix, None, Decision::NoQuorum { buys, required });
        }
        if book.ledger.has_position(proposal.symbol) {
            telemetry.record(TelemetryEvent::AlreadyHeld {
                symbol: proposal.symbol.to_string(),
            });
            return outcome(matrix, None, Decision::AlreadyHeld);
        }

        let selected = select_trigger(&matrix, &self.roles());
        let trigger = selected.to_string();
        let quantity = self.config.trade_quantity;
        let cost = book.ledger.fee_schedule().quote(quantity, price).total_cost();
        let value = book.ledger.portfolio_value(book.price_map);

        if let Err(rejection) = book.guardrail.check_trade(value, cost, proposal.symbol) {
            telemetry.record(TelemetryEvent::TradeRejected {
                symbol: proposal.symbol.to_string(),
                reason: rejection.to_string(),
            });
            return outcome(matrix, Some(trigger), Decision::Rejected(rejection));
        }

        let order = TradeOrder {
            symbol: proposal.symbol.to_string(),
            side: Side::Buy,
            quantity,
            price,
            category: proposal.category.to_string(),
            trigger: trigger.clone(),
            trigger_kind: selected.kind().to_string(),
            decision: matrix.clone(),
            timestamp: proposal.timestamp,
        };
        match book.ledger.execute(order) {
            Ok(record) => {
                telemetry.record(TelemetryEvent::TradeExecuted {
                    symbol: record.symbol.clone(),
                    side: record.side,
                    quantity: record.quantity,
                    price: record.price,
                    trigger: record.trigger.clone(),
                });
                outcome(matrix, Some(trigger), Decision::Executed(record))
            }
            Err(err) => {
                telemetry.record(TelemetryEvent::TradeRejected {
                    symbol: proposal.symbol.to_string(),
                    reason: err.to_string(),
                });
                outcome(matrix, Some(trigger), Decision::LedgerRejected(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_telemetry::MemoryTelemetry;
    use crate::domain::guardrail::GuardrailConfig;
    use crate::domain::oracle::RandomizedOracle;
    use crate::domain::position::Horizon;

    struct Fixed {
        name: &'static str,
        role: OracleRole,
        vote: Vote,
    }

    impl Oracle for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn role(&self) -> OracleRole {
            self.role
        }
        fn vote(&mut self, _: &MarketContext<'_>) -> OracleVote {
            OracleVote::cast(self.vote)
        }
    }

    fn fixed(name: &'static str, role: OracleRole, vote: Vote) -> Box<dyn Oracle> {
        Box::new(Fixed { name, role, vote })
    }

    fn four_oracles(regime: Vote, llm: Vote) -> Vec<Box<dyn Oracle>> {
        vec![
            fixed("A", OracleRole::Heuristic, Vote::Buy),
            fixed("B", OracleRole::Regime, regime),
            fixed("C", OracleRole::Sentiment, llm),
            fixed("D", OracleRole::Heuristic, Vote::Sell),
        ]
    }

    fn proposal<'a>(prices: &'a [f64], volatility: VolatilityRegime) -> Proposal<'a> {
        Proposal {
            symbol: "AAPL",
            category: "STOCKS",
            prices,
            sentiment: 0.0,
            volatility,
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn price_map(price: f64) -> HashMap<String, f64> {
        HashMap::from([("AAPL".to_string(), price)])
    }

    #[test]
    fn quorum_follows_volatility() {
        let q = QuorumPolicy::default();
        assert_eq!(q.required(VolatilityRegime::Low), 2);
        assert_eq!(q.required(VolatilityRegime::Moderate), 2);
        assert_eq!(q.required(VolatilityRegime::High), 3);
        assert_eq!(q.required(VolatilityRegime::Extreme), 3);
    }

    #[test]
    fn trigger_priority() {
        let roles = vec![
            ("M".to_string(), OracleRole::Regime),
            ("C".to_string(), OracleRole::Sentiment),
        ];
        let both: DecisionMatrix = [("M", Vote::Buy), ("C", Vote::Buy)].into_iter().collect();
        assert_eq!(select_trigger(&both, &roles), Trigger::Regime("M".into()));
        let llm: DecisionMatrix = [("M", Vote::Hold), ("C", Vote::Buy)].into_iter().collect();
        assert_eq!(select_trigger(&llm, &roles), Trigger::Sentiment("C".into()));
        let none: DecisionMatrix = [("M", Vote::Hold), ("C", Vote::Sell)].into_iter().collect();
        assert_eq!(select_trigger(&none, &roles), Trigger::Majority);
        assert!(Trigger::Regime("M".into()).to_string().contains("regime"));
        assert!(Trigger::Sentiment("C".into()).to_string().contains("sentiment"));
        assert_eq!(Trigger::Sentiment("RegimeWatch".into()).kind(), "sentiment trigger");
        assert_eq!(Trigger::Majority.kind(), "majority consensus");
    }

    #[test]
    fn horizon_follows_trigger_kind_not_oracle_name() {
        let oracles = vec![
            fixed("A", OracleRole::Heuristic, Vote::Buy),
            fixed("B", OracleRole::Regime, Vote::Hold),
            fixed("RegimeWatch", OracleRole::Sentiment, Vote::Buy),
        ];
        let mut engine = ConsensusEngine::new(oracles, ConsensusConfig::default());
        let mut ledger = Ledger::with_cash(100_000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();

        let out = engine.decide(
            &proposal(&[100.0], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert!(out.decision.is_executed());
        assert_eq!(out.trigger.as_deref(), Some("RegimeWatch sentiment trigger"));
        assert_eq!(ledger.position("AAPL").unwrap().horizon, Horizon::Long);
    }

    #[test]
    fn randomized_votes_are_flagged() {
        let mut oracles = four_oracles(Vote::Buy, Vote::Hold);
        oracles.push(Box::new(RandomizedOracle::conservative("Gamma", 3)));
        let mut engine = ConsensusEngine::new(oracles, ConsensusConfig::default());
        assert_eq!(engine.randomized_oracles(), vec!["Gamma".to_string()]);

        let mut ledger = Ledger::with_cash(100_000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();
        let out = engine.decide(
            &proposal(&[100.0], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert_eq!(out.randomized, vec!["Gamma".to_string()]);

        let skipped = engine.decide(
            &proposal(&[], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert!(skipped.randomized.is_empty());
    }

    #[test]
    fn two_buys_meet_calm_quorum() {
        let mut engine = ConsensusEngine::new(
            four_oracles(Vote::Buy, Vote::Hold),
            ConsensusConfig::default(),
        );
        let mut ledger = Ledger::with_cash(100_000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();

        let out = engine.decide(
            &proposal(&[100.0], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert!(out.decision.is_executed());
        assert_eq!(out.trigger.as_deref(), Some("B regime trigger"));
        assert!(ledger.has_position("AAPL"));
        assert_eq!(ledger.position("AAPL").unwrap().decision, out.matrix);
    }

    #[test]
    fn two_buys_miss_elevated_quorum() {
        let mut engine = ConsensusEngine::new(
            four_oracles(Vote::Buy, Vote::Hold),
            ConsensusConfig::default(),
        );
        let mut ledger = Ledger::with_cash(100_000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();

        let out = engine.decide(
            &proposal(&[100.0], VolatilityRegime::High),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert_eq!(
            out.decision,
            Decision::NoQuorum {
                buys: 2,
                required: 3
            }
        );
        assert!(!ledger.has_position("AAPL"));
        assert!(telemetry.events().iter().any(|e| matches!(e, TelemetryEvent::QuorumMissed { .. })));
    }

    #[test]
    fn held_symbol_is_not_bought_again() {
        let mut engine = ConsensusEngine::new(
            four_oracles(Vote::Buy, Vote::Buy),
            ConsensusConfig::default(),
        );
        let mut ledger = Ledger::with_cash(100_000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();

        for _ in 0..2 {
            engine.decide(
                &proposal(&[100.0], VolatilityRegime::Low),
                Book {
                    ledger: &mut ledger,
                    guardrail: &mut guardrail,
                    price_map: &prices,
                },
                &telemetry,
            );
        }
        assert_eq!(ledger.history().len(), 1);
        assert!(telemetry.events().contains(&TelemetryEvent::AlreadyHeld {
            symbol: "AAPL".into()
        }));
    }

    #[test]
    fn guardrail_rejection_leaves_ledger_untouched() {
        let mut engine = ConsensusEngine::new(
            four_oracles(Vote::Buy, Vote::Buy),
            ConsensusConfig::default(),
        );
        // 5% of 1000 is 50; one share at 100 is too large.
        let mut ledger = Ledger::with_cash(1000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = price_map(100.0);
        let telemetry = MemoryTelemetry::new();

        let out = engine.decide(
            &proposal(&[100.0], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert!(matches!(
            out.decision,
            Decision::Rejected(GuardrailRejection::PositionTooLarge { .. })
        ));
        assert!((ledger.cash() - 1000.0).abs() < f64::EPSILON);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn empty_series_is_skipped() {
        let mut engine = ConsensusEngine::new(
            four_oracles(Vote::Buy, Vote::Buy),
            ConsensusConfig::default(),
        );
        let mut ledger = Ledger::with_cash(1000.0);
        let mut guardrail = Guardrail::new(GuardrailConfig::default());
        let prices = HashMap::new();
        let telemetry = MemoryTelemetry::new();

        let out = engine.decide(
            &proposal(&[], VolatilityRegime::Low),
            Book {
                ledger: &mut ledger,
                guardrail: &mut guardrail,
                price_map: &prices,
            },
            &telemetry,
        );
        assert!(matches!(out.decision, Decision::Skipped { .. }));
        assert!(out.matrix.is_empty());
    }
}
