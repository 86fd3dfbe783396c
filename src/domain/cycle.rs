//! One trading cycle: fetch, rank, decide, value.

use std::collections::HashMap;

use super::consensus::{Book, ConsensusEngine, Decision, Proposal, SymbolOutcome};
use super::error::DeskError;
use super::guardrail::Guardrail;
use super::ledger::Ledger;
use super::outlook::MacroOutlook;
use super::run_state::{CycleView, RunState};
use super::scheduler::Clock;
use super::sentiment::average_weighted;
use crate::ports::news_port::{NewsPort, headlines_or_neutral};
use crate::ports::price_port::{PricePort, closes};
use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

/// A symbol under consideration and its asset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub symbol: String,
    pub category: String,
}

impl Candidate {
    pub fn new(symbol: impl Into<String>, category: impl Into<String>) -> Self {
        Candidate {
            symbol: symbol.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CyclePlan {
    pub candidates: Vec<Candidate>,
    pub period: String,
    pub interval: String,
    pub news_categories: Vec<String>,
    pub outlook: MacroOutlook,
}

pub struct CycleSources<'a> {
    pub prices: &'a dyn PricePort,
    pub news: &'a dyn NewsPort,
    pub clock: &'a dyn Clock,
    pub telemetry: &'a dyn TelemetryPort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<SymbolOutcome>,
    pub price_map: HashMap<String, f64>,
    pub headlines: Vec<String>,
    pub sentiment: f64,
    pub trades: usize,
    pub total_value: f64,
}

/// Return over the whole series; series that cannot be ranked sort last.
fn period_return(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) => {
            let r = (last - first) / first;
            if r.is_finite() { r } else { f64::NEG_INFINITY }
        }
        _ => f64::NEG_INFINITY,
    }
}

/// Ledger, guardrail and consensus engine owned together by the cycle driver.
pub struct TradingDesk {
    ledger: Ledger,
    guardrail: Guardrail,
    engine: ConsensusEngine,
}

impl TradingDesk {
    pub fn new(ledger: Ledger, guardrail: Guardrail, engine: ConsensusEngine) -> Self {
        TradingDesk {
            ledger,
            guardrail,
            engine,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn guardrail(&self) -> &Guardrail {
        &self.guardrail
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Evaluates every candidate once, strongest period return first.
    ///
    /// Price source errors and empty series skip the symbol. News source
    /// errors abort the cycle before anything is traded.
    pub fn run_cycle(
        &mut self,
        plan: &CyclePlan,
        sources: &CycleSources<'_>,
    ) -> Result<CycleReport, DeskError> {
        let mut headlines = Vec::new();
        for category in &plan.news_categories {
            headlines.extend(headlines_or_neutral(sources.news, category, sources.telemetry));
        }
        let sentiment = average_weighted(&headlines);

        let mut outcomes = Vec::new();
        let mut fetched: Vec<(&Candidate, Vec<f64>)> = Vec::new();
        for candidate in &plan.candidates {
            let reason = match sources
                .prices
                .fetch_series(&candidate.symbol, &plan.period, &plan.interval)
            {
                Ok(series) if !series.is_empty() => {
                    fetched.push((candidate, closes(&series)));
                    continue;
                }
                Ok(_) => "no price data".to_string(),
                Err(err) => err.to_string(),
            };
            sources.telemetry.record(TelemetryEvent::SymbolSkipped {
                symbol: candidate.symbol.clone(),
                reason: reason.clone(),
            });
            outcomes.push(SymbolOutcome {
                symbol: candidate.symbol.clone(),
                category: candidate.category.clone(),
                matrix: Default::default(),
                trigger: None,
                decision: Decision::Skipped { reason },
                randomized: Vec::new(),
            });
        }

        fetched.sort_by(|a, b| period_return(&b.1).total_cmp(&period_return(&a.1)));

        let mut price_map = HashMap::new();
        for (candidate, prices) in &fetched {
            if let Some(&last) = prices.last() {
                price_map.insert(candidate.symbol.clone(), last);
            }
            let proposal = Proposal {
                symbol: &candidate.symbol,
                category: &candidate.category,
                prices,
                sentiment,
                volatility: plan.outlook.volatility,
                timestamp: sources.clock.now(),
            };
            let book = Book {
                ledger: &mut self.ledger,
                guardrail: &mut self.guardrail,
                price_map: &price_map,
            };
            outcomes.push(self.engine.decide(&proposal, book, sources.telemetry));
        }

        let trades = outcomes.iter().filter(|o| o.decision.is_executed()).count();
        let total_value = self.ledger.portfolio_value(&price_map);
        sources
            .telemetry
            .record(TelemetryEvent::CycleCompleted { trades, total_value });

        Ok(CycleReport {
            outcomes,
            price_map,
            headlines,
            sentiment,
            trades,
            total_value,
        })
    }

    /// Snapshot of the desk after `report`, stamped with the clock's time.
    pub fn run_state(&self, report: &CycleReport, plan: &CyclePlan, clock: &dyn Clock) -> RunState {
        let view = CycleView {
            price_map: &report.price_map,
            headlines: &report.headlines,
            sentiment: report.sentiment,
            outlook: &plan.outlook,
            outcomes: &report.outcomes,
        };
        RunState::capture(&self.ledger, &view, clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_telemetry::MemoryTelemetry;
    use crate::domain::consensus::ConsensusConfig;
    use crate::domain::guardrail::GuardrailConfig;
    use crate::domain::oracle::{MarketContext, Oracle};
    use crate::domain::scheduler::ManualClock;
    use crate::domain::sentiment::NEUTRAL_HEADLINES;
    use crate::domain::vote::{OracleVote, Vote};
    use crate::ports::price_port::PricePoint;
    use chrono::{DateTime, Utc};

    struct AlwaysBuy(&'static str);

    impl Oracle for AlwaysBuy {
        fn name(&self) -> &str {
            self.0
        }
        fn vote(&mut self, _: &MarketContext<'_>) -> OracleVote {
            OracleVote::cast(Vote::Buy)
        }
    }

    struct Prices(HashMap<&'static str, Vec<f64>>);

    impl PricePort for Prices {
        fn fetch_series(&self, symbol: &str, _: &str, _: &str) -> Result<Vec<PricePoint>, DeskError> {
            let Some(closes) = self.0.get(symbol) else {
                return Err(DeskError::PriceData {
                    symbol: symbol.to_string(),
                    reason: "unknown symbol".into(),
                });
            };
            Ok(closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint {
                    timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000 + i as i64 * 86_400, 0)
                        .unwrap(),
                    close,
                })
                .collect())
        }
    }

    struct NoNews;

    impl NewsPort for NoNews {
        fn fetch_headlines(&self, _: &str) -> Result<Vec<String>, DeskError> {
            Ok(Vec::new())
        }
    }

    struct BrokenNews;

    impl NewsPort for BrokenNews {
        fn fetch_headlines(&self, _: &str) -> Result<Vec<String>, DeskError> {
            Err(DeskError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stream did not contain valid UTF-8",
            )))
        }
    }

    fn desk() -> TradingDesk {
        let oracles: Vec<Box<dyn Oracle>> = vec![Box::new(AlwaysBuy("A")), Box::new(AlwaysBuy("B"))];
        TradingDesk::new(
            Ledger::with_cash(10_000.0),
            Guardrail::new(GuardrailConfig::default()),
            ConsensusEngine::new(oracles, ConsensusConfig::default()),
        )
    }

    fn plan(symbols: &[&str]) -> CyclePlan {
        CyclePlan {
            candidates: symbols.iter().map(|s| Candidate::new(*s, "STOCKS")).collect(),
            period: "1mo".into(),
            interval: "1d".into(),
            news_categories: vec!["business".into()],
            outlook: MacroOutlook::resolve(50.0, None),
        }
    }

    #[test]
    fn ranks_by_return_and_skips_missing() {
        let prices = Prices(
            [("SLOW", vec![100.0, 101.0]), ("FAST", vec![10.0, 20.0]), ("EMPTY", vec![])]
                .into_iter()
                .collect(),
        );
        let clock = ManualClock::new(DateTime::<Utc>::from_timestamp(1_800_000_000, 0).unwrap());
        let telemetry = MemoryTelemetry::new();
        let sources = CycleSources {
            prices: &prices,
            news: &NoNews,
            clock: &clock,
            telemetry: &telemetry,
        };
        let mut desk = desk();
        let report = desk
            .run_cycle(&plan(&["SLOW", "MISSING", "FAST", "EMPTY"]), &sources)
            .unwrap();

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(order, vec!["MISSING", "EMPTY", "FAST", "SLOW"]);
        assert_eq!(report.trades, 2);
        assert!(desk.ledger().has_position("FAST"));
        assert_eq!(
            desk.ledger().position("FAST").unwrap().opened_at,
            clock.now()
        );
        assert!(matches!(
            telemetry.events().last(),
            Some(TelemetryEvent::CycleCompleted { trades: 2, .. })
        ));

        let state = desk.run_state(&report, &plan(&[]), &clock);
        assert_eq!(state.decisions.len(), 4);
        assert_eq!(state.current_prices.len(), 2);
    }

    #[test]
    fn second_cycle_reports_already_held() {
        let prices = Prices([("AAPL", vec![100.0, 101.0])].into_iter().collect());
        let clock = ManualClock::new(DateTime::<Utc>::from_timestamp(1_800_000_000, 0).unwrap());
        let telemetry = MemoryTelemetry::new();
        let sources = CycleSources {
            prices: &prices,
            news: &NoNews,
            clock: &clock,
            telemetry: &telemetry,
        };
        let mut desk = desk();
        desk.run_cycle(&plan(&["AAPL"]), &sources).unwrap();
        let second = desk.run_cycle(&plan(&["AAPL"]), &sources).unwrap();
        assert_eq!(second.outcomes[0].decision, Decision::AlreadyHeld);
        assert_eq!(desk.ledger().history().len(), 1);
    }

    #[test]
    fn unreadable_news_falls_back_to_neutral() {
        let prices = Prices([("AAPL", vec![100.0, 101.0])].into_iter().collect());
        let clock = ManualClock::new(DateTime::<Utc>::from_timestamp(1_800_000_000, 0).unwrap());
        let telemetry = MemoryTelemetry::new();
        let sources = CycleSources {
            prices: &prices,
            news: &BrokenNews,
            clock: &clock,
            telemetry: &telemetry,
        };
        let mut desk = desk();
        let report = desk.run_cycle(&plan(&["AAPL"]), &sources).unwrap();

        assert_eq!(report.trades, 1);
        assert_eq!(report.headlines, NEUTRAL_HEADLINES.to_vec());
        assert!(report.sentiment > 0.0);
        assert!(telemetry.events().iter().any(|e| matches!(
            e,
            TelemetryEvent::NewsFallback { category, .. } if category == "business"
        )));
    }
}
