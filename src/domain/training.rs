//! Offline training sessions and the training pass that sweeps them.
//!
//! Each session is an independent value implementing [`TrainingSession`]:
//! it takes a typed input and returns a [`SessionReport`]. Sessions hold no
//! shared mutable state; the pass only collects their reports.

use serde::Serialize;

use super::error::DeskError;
use super::ethics::{CorruptionIndex, DEFAULT_MIN_SCORE};
use super::indicator::{pct_change_std, rolling_rsi};
use super::regime::RegimeClassifier;
use super::sentiment::average_weighted;
use crate::ports::news_port::{NewsPort, headlines_or_neutral};
use crate::ports::price_port::{PricePort, closes};
use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub parameters: String,
    /// Percent.
    pub performance: f64,
    pub notes: String,
}

pub trait TrainingSession {
    type Input: ?Sized;

    fn name(&self) -> &str;

    fn run(&self, input: &Self::Input) -> SessionReport;
}

fn simple_return(from: f64, to: f64) -> f64 {
    let r = (to - from) / from;
    if r.is_finite() { r } else { 0.0 }
}

/// Trailing stop-loss simulation. The stop widens to at least 8% when the
/// series is volatile.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSession {
    pub stop_loss: f64,
}

pub const VOLATILE_RETURN_STD: f64 = 0.02;
pub const VOLATILE_MIN_STOP: f64 = 0.08;

impl TrainingSession for RiskSession {
    type Input = [f64];

    fn name(&self) -> &str {
        "risk"
    }

    fn run(&self, prices: &[f64]) -> SessionReport {
        let mut stop = self.stop_loss;
        let volatility = pct_change_std(prices).unwrap_or(0.0);
        let widened = volatility > VOLATILE_RETURN_STD && stop < VOLATILE_MIN_STOP;
        if volatility > VOLATILE_RETURN_STD {
            stop = stop.max(VOLATILE_MIN_STOP);
        }
        let parameters = format!("stop-loss {:.1}%", stop * 100.0);

        let (Some(&first), Some(&last)) = (prices.first(), prices.last()) else {
            return SessionReport {
                session: self.name().to_string(),
                parameters,
                performance: 0.0,
                notes: "no prices".to_string(),
            };
        };

        let mut peak = first;
        let mut exit = last;
        let mut triggered = false;
        for &price in prices {
            if price > peak {
                peak = price;
            }
            if peak > 0.0 && (peak - price) / peak >= stop {
                exit = price;
                triggered = true;
                break;
            }
        }

        let mut notes = if triggered {
            format!("stop hit at {exit:.4}")
        } else {
            "held to end".to_string()
        };
        if widened {
            notes.push_str(&format!("; volatility {volatility:.4} widened stop"));
        }

        SessionReport {
            session: self.name().to_string(),
            parameters,
            performance: simple_return(first, exit) * 100.0,
            notes,
        }
    }
}

/// Buys the last oversold bar (RSI below 30) and holds to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSession {
    pub rsi_window: usize,
}

pub const OVERSOLD: f64 = 30.0;

impl TrainingSession for GrowthSession {
    type Input = [f64];

    fn name(&self) -> &str {
        "growth"
    }

    fn run(&self, prices: &[f64]) -> SessionReport {
        let parameters = format!("RSI window {}", self.rsi_window);
        let rsi = rolling_rsi(prices, self.rsi_window);
        let Some(current) = rsi.last().copied().flatten() else {
            return SessionReport {
                session: self.name().to_string(),
                parameters,
                performance: 0.0,
                notes: "insufficient data for RSI".to_string(),
            };
        };

        let entry = rsi
            .iter()
            .rposition(|r| r.is_some_and(|v| v < OVERSOLD))
            .unwrap_or(0);
        let roi = simple_return(prices[entry], prices[prices.len() - 1]);

        SessionReport {
            session: self.name().to_string(),
            parameters,
            performance: roi * 100.0,
            notes: format!("RSI {current:.2}, entry bar {entry}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentimentSession;

impl TrainingSession for SentimentSession {
    type Input = [String];

    fn name(&self) -> &str {
        "sentiment"
    }

    fn run(&self, headlines: &[String]) -> SessionReport {
        if headlines.is_empty() {
            return SessionReport {
                session: self.name().to_string(),
                parameters: "news analysis".to_string(),
                performance: 0.0,
                notes: "no headlines".to_string(),
            };
        }
        let avg = average_weighted(headlines);
        SessionReport {
            session: self.name().to_string(),
            parameters: format!("news analysis, {} headlines", headlines.len()),
            performance: avg * 100.0,
            notes: format!("weighted sentiment {avg:.2}"),
        }
    }
}

/// Regime classification plus pattern forecast.
#[derive(Debug, Clone, Default)]
pub struct RegimeSession {
    pub classifier: RegimeClassifier,
}

impl TrainingSession for RegimeSession {
    type Input = [f64];

    fn name(&self) -> &str {
        "regime"
    }

    fn run(&self, prices: &[f64]) -> SessionReport {
        let estimate = self.classifier.classify(prices);
        let forecast = self.classifier.forecast(prices);
        let direction = if forecast > 0.0 { "UP" } else { "DOWN" };
        let mut notes = format!(
            "regime {}, pattern forecast {direction} ({forecast:.4})",
            estimate.label
        );
        if let Some(err) = estimate.fallback {
            notes.push_str(&format!("; fallback: {err}"));
        }
        SessionReport {
            session: self.name().to_string(),
            parameters: format!(
                "HMM + pattern window {}",
                self.classifier.config().pattern_window
            ),
            performance: forecast * 100.0,
            notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EthicsEntry {
    pub symbol: String,
    pub score: u32,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EthicsAssessment {
    pub average: f64,
    pub status: &'static str,
    pub entries: Vec<EthicsEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EthicsSession {
    pub index: CorruptionIndex,
    pub min_score: u32,
}

impl Default for EthicsSession {
    fn default() -> Self {
        EthicsSession {
            index: CorruptionIndex::default(),
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl EthicsSession {
    pub fn assess(&self, symbols: &[String]) -> EthicsAssessment {
        let entries: Vec<EthicsEntry> = symbols
            .iter()
            .map(|s| {
                let score = self.index.company_score(s);
                EthicsEntry {
                    symbol: s.clone(),
                    score,
                    passed: score >= self.min_score,
                }
            })
            .collect();
        let average = if entries.is_empty() {
            100.0
        } else {
            entries.iter().map(|e| f64::from(e.score)).sum::<f64>() / entries.len() as f64
        };
        let status = if average > 70.0 {
            "HIGHLY ETHICAL"
        } else {
            "MARGINAL"
        };
        EthicsAssessment {
            average,
            status,
            entries,
        }
    }
}

impl TrainingSession for EthicsSession {
    type Input = [String];

    fn name(&self) -> &str {
        "ethics"
    }

    fn run(&self, symbols: &[String]) -> SessionReport {
        let assessment = self.assess(symbols);
        let rejected: Vec<&str> = assessment
            .entries
            .iter()
            .filter(|e| !e.passed)
            .map(|e| e.symbol.as_str())
            .collect();
        let mut notes = assessment.status.to_string();
        if !rejected.is_empty() {
            notes.push_str(&format!("; rejected {}", rejected.join(", ")));
        }
        SessionReport {
            session: self.name().to_string(),
            parameters: format!("{} assets, threshold {}", symbols.len(), self.min_score),
            performance: assessment.average,
            notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPlan {
    pub symbols: Vec<String>,
    pub stop_losses: Vec<f64>,
    pub rsi_windows: Vec<usize>,
    pub news_categories: Vec<String>,
    pub period: String,
    pub interval: String,
}

impl Default for TrainingPlan {
    fn default() -> Self {
        TrainingPlan {
            symbols: Vec::new(),
            stop_losses: vec![0.01, 0.03, 0.05, 0.08, 0.12],
            rsi_windows: vec![7, 14, 21, 28],
            news_categories: vec!["business".to_string(), "market".to_string()],
            period: "5y".to_string(),
            interval: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrainingOutcome {
    pub reports: Vec<SessionReport>,
    pub skipped: Vec<String>,
}

/// Sources a training pass reads from.
pub struct TrainingSources<'a> {
    pub prices: &'a dyn PricePort,
    pub news: &'a dyn NewsPort,
    pub telemetry: &'a dyn TelemetryPort,
}

/// Per symbol: risk sweep, growth sweep, regime session. Then sentiment per
/// news category and a final ethics session over all symbols. Symbols with an
/// empty series are skipped; data source errors abort the pass.
pub fn run_training_pass(
    plan: &TrainingPlan,
    regime: &RegimeSession,
    ethics: &EthicsSession,
    sources: &TrainingSources<'_>,
) -> Result<TrainingOutcome, DeskError> {
    let mut outcome = TrainingOutcome::default();
    let record = |report: SessionReport, outcome: &mut TrainingOutcome| {
        sources.telemetry.record(TelemetryEvent::SessionCompleted {
            session: report.session.clone(),
            parameters: report.parameters.clone(),
            performance: report.performance,
            notes: report.notes.clone(),
        });
        outcome.reports.push(report);
    };

    for symbol in &plan.symbols {
        let series = sources
            .prices
            .fetch_series(symbol, &plan.period, &plan.interval)?;
        if series.is_empty() {
            sources.telemetry.record(TelemetryEvent::SymbolSkipped {
                symbol: symbol.clone(),
                reason: "no training data".to_string(),
            });
            outcome.skipped.push(symbol.clone());
            continue;
        }
        let prices = closes(&series);

        for &stop_loss in &plan.stop_losses {
            let mut report = RiskSession { stop_loss }.run(&prices);
            report.parameters = format!("{symbol}: {}", report.parameters);
            record(report, &mut outcome);
        }
        for &rsi_window in &plan.rsi_windows {
            let mut report = GrowthSession { rsi_window }.run(&prices);
            report.parameters = format!("{symbol}: {}", report.parameters);
            record(report, &mut outcome);
        }
        let mut report = regime.run(&prices);
        report.parameters = format!("{symbol}: {}", report.parameters);
        record(report, &mut outcome);
    }

    for category in &plan.news_categories {
        let headlines = headlines_or_neutral(sources.news, category, sources.telemetry);
        let mut report = SentimentSession.run(&headlines);
        report.parameters = format!("{category}: {}", report.parameters);
        record(report, &mut outcome);
    }

    record(ethics.run(&plan.symbols), &mut outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn risk_session_stops_out() {
        let prices = [100.0, 110.0, 104.0, 120.0];
        // 110 -> 104 is a 5.45% drawdown, volatility is high so stop widens
        let tight = RiskSession { stop_loss: 0.05 }.run(&prices);
        assert!(tight.parameters.contains("8.0%"));
        assert_relative_eq!(tight.performance, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn risk_session_calm_series_uses_given_stop() {
        let prices = [100.0, 100.5, 101.0, 100.9, 100.0, 101.5];
        let report = RiskSession { stop_loss: 0.005 }.run(&prices);
        assert!(report.parameters.contains("0.5%"));
        // 101.0 -> 100.0 is just under 1%, stop at 0.5% triggers at 100.0
        assert_relative_eq!(report.performance, 0.0, epsilon = 1e-9);
        assert!(report.notes.contains("stop hit"));
    }

    #[test]
    fn risk_session_without_prices() {
        let report = RiskSession { stop_loss: 0.05 }.run(&[]);
        assert_eq!(report.performance, 0.0);
    }

    #[test]
    fn growth_session_needs_rsi() {
        let report = GrowthSession { rsi_window: 14 }.run(&[1.0, 2.0, 3.0]);
        assert_eq!(report.performance, 0.0);
        assert!(report.notes.contains("insufficient data"));
    }

    #[test]
    fn growth_session_enters_on_last_oversold_bar() {
        // Falls to 80 (RSI 0), then recovers to 100.
        let prices = [100.0, 95.0, 90.0, 85.0, 80.0, 90.0, 100.0];
        let report = GrowthSession { rsi_window: 2 }.run(&prices);
        // bar 4 is the last with RSI < 30
        assert_relative_eq!(report.performance, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn growth_session_without_oversold_uses_first_bar() {
        let prices = [100.0, 101.0, 102.0, 103.0, 104.0];
        let report = GrowthSession { rsi_window: 2 }.run(&prices);
        assert_relative_eq!(report.performance, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn sentiment_session() {
        assert_eq!(SentimentSession.run(&[]).performance, 0.0);
        let report = SentimentSession.run(&["good".to_string()]);
        assert_relative_eq!(report.performance, 0.7 * 1.6 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn regime_session_reports_forecast() {
        let report = RegimeSession::default().run(&[100.0, 101.0, 102.0]);
        assert_eq!(report.performance, 0.0);
        assert!(report.notes.contains("Stable-Growth"));
    }

    #[test]
    fn ethics_assessment() {
        let session = EthicsSession::default();
        let a = session.assess(&["AAPL".to_string(), "EQNR.OL".to_string()]);
        assert_relative_eq!(a.average, 78.5);
        assert_eq!(a.status, "HIGHLY ETHICAL");

        let b = session.assess(&["AAPL".to_string(), "COAL_CORP".to_string()]);
        assert_eq!(b.status, "MARGINAL");
        assert!(!b.entries[1].passed);

        let empty = session.assess(&[]);
        assert_relative_eq!(empty.average, 100.0);

        let report = session.run(&["WEAPONS_INC".to_string()]);
        assert!(report.notes.contains("rejected WEAPONS_INC"));
    }
}
