//! CLI definition, config building and command dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::csv_adapter::{CsvPriceAdapter, read_series};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_news_adapter::FileNewsAdapter;
use crate::adapters::json_run_state_adapter::JsonRunStateAdapter;
use crate::adapters::offline_judge::OfflineJudge;
use crate::adapters::tracing_telemetry::TracingTelemetry;
use crate::domain::config::{
    DataConfig, DeskConfig, OracleConfig, default_training_symbols, default_universe,
};
use crate::domain::config_validation::validate_desk_config;
use crate::domain::consensus::{ConsensusEngine, QuorumPolicy};
use crate::domain::cycle::{Candidate, CycleReport, CycleSources, TradingDesk};
use crate::domain::error::DeskError;
use crate::domain::ledger::{FeeSchedule, Ledger};
use crate::domain::outlook::{MacroOutlook, VolatilityRegime};
use crate::domain::position::{Horizon, HorizonRules};
use crate::domain::regime::{RegimeClassifier, RegimeConfig, RegimeLabel, is_entry_signal};
use crate::domain::scheduler::{
    CancelToken, Clock, ScheduleConfig, ScheduleSummary, Scheduler, SystemClock,
};
use crate::domain::training::{TrainingPlan, TrainingSources, run_training_pass};
use crate::ports::config_port::ConfigPort;
use crate::ports::judge_port::JudgePort;
use crate::ports::news_port::NewsPort;
use crate::ports::price_port::{PricePort, closes};
use crate::ports::run_state_port::RunStatePort;
use crate::ports::telemetry_port::TelemetryPort;

#[derive(Parser, Debug)]
#[command(name = "tradedesk", about = "Simulated multi-oracle trading desk")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one trading cycle and write the run state
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the training sessions, once or on the configured schedule
    Train {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long = "loop")]
        repeat: bool,
        #[arg(long)]
        max_passes: Option<u64>,
    },
    /// Classify the regime of a single price file
    Regime {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        window: Option<usize>,
        /// Second price file for a pairs z-score
        #[arg(long)]
        pair: Option<PathBuf>,
    },
    /// Validate a desk configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Cycle { config, output } => run_cycle(&config, output.as_deref()),
        Command::Train {
            config,
            repeat,
            max_passes,
        } => run_train(&config, repeat, max_passes),
        Command::Regime { file, window, pair } => run_regime(&file, window, pair.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &DeskError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Loads, builds and validates the desk configuration at `path`.
pub fn load_desk_config(path: &Path) -> Result<DeskConfig, ExitCode> {
    tracing::info!(path = %path.display(), "loading config");
    let adapter = load_config(path)?;
    let config = build_desk_config(&adapter).map_err(|e| fail(&e))?;
    validate_desk_config(&config).map_err(|e| fail(&e))?;
    Ok(config)
}

fn invalid(section: &str, key: &str, reason: String) -> DeskError {
    DeskError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason,
    }
}

/// Parses an optional value, erroring on anything present but malformed.
fn value<T: FromStr>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, DeskError>
where
    T::Err: std::fmt::Display,
{
    match adapter.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| invalid(section, key, format!("cannot parse '{raw}': {e}"))),
    }
}

fn list_of<T: FromStr>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Vec<T>,
) -> Result<Vec<T>, DeskError>
where
    T::Err: std::fmt::Display,
{
    let items = adapter.get_list(section, key);
    if items.is_empty() {
        return Ok(default);
    }
    items
        .iter()
        .map(|raw| {
            raw.parse()
                .map_err(|e| invalid(section, key, format!("cannot parse '{raw}': {e}")))
        })
        .collect()
}

fn string_or(adapter: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    adapter
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string())
}

fn build_horizon_rules(adapter: &dyn ConfigPort) -> Result<HorizonRules, DeskError> {
    let default = match adapter.get_string("horizon", "default") {
        None => Horizon::Medium,
        Some(raw) => Horizon::parse(&raw)
            .ok_or_else(|| invalid("horizon", "default", format!("unknown horizon '{raw}'")))?,
    };
    let entries = adapter.get_list("horizon", "rules");
    if entries.is_empty() {
        return Ok(HorizonRules::new(HorizonRules::default_rules(), default));
    }
    let rules = entries
        .iter()
        .map(|entry| {
            let (keyword, horizon) = entry.split_once(':').ok_or_else(|| {
                invalid("horizon", "rules", format!("expected keyword:horizon, got '{entry}'"))
            })?;
            let horizon = Horizon::parse(horizon).ok_or_else(|| {
                invalid("horizon", "rules", format!("unknown horizon '{}'", horizon.trim()))
            })?;
            Ok((keyword.trim().to_string(), horizon))
        })
        .collect::<Result<Vec<_>, DeskError>>()?;
    Ok(HorizonRules::new(rules, default))
}

/// `[universe]` keys, upper-cased into the category tag.
pub const UNIVERSE_CATEGORIES: [&str; 4] = ["stocks", "forex", "crypto", "bonds"];

pub fn resolve_universe(adapter: &dyn ConfigPort) -> Vec<Candidate> {
    let configured: Vec<Candidate> = UNIVERSE_CATEGORIES
        .iter()
        .flat_map(|category| {
            adapter
                .get_list("universe", category)
                .into_iter()
                .map(move |symbol| Candidate::new(symbol, category.to_ascii_uppercase()))
        })
        .collect();
    if configured.is_empty() {
        default_universe()
    } else {
        configured
    }
}

pub fn build_desk_config(adapter: &dyn ConfigPort) -> Result<DeskConfig, DeskError> {
    let d = DeskConfig::default();

    let mut ledger = d.ledger.clone();
    ledger.initial_cash = value(adapter, "ledger", "initial_cash", ledger.initial_cash)?;
    ledger.fees = FeeSchedule {
        commission_rate: value(
            adapter,
            "ledger",
            "commission_rate",
            ledger.fees.commission_rate,
        )?,
        slippage_rate: value(adapter, "ledger", "slippage_rate", ledger.fees.slippage_rate)?,
    };
    ledger.horizons = build_horizon_rules(adapter)?;

    let mut guardrail = d.guardrail.clone();
    guardrail.max_drawdown = value(adapter, "guardrail", "max_drawdown", guardrail.max_drawdown)?;
    guardrail.max_position_fraction = value(
        adapter,
        "guardrail",
        "max_position_fraction",
        guardrail.max_position_fraction,
    )?;
    guardrail
        .restricted
        .extend(adapter.get_list("guardrail", "restricted"));

    let mut consensus = d.consensus.clone();
    consensus.quorum = QuorumPolicy {
        calm: value(adapter, "consensus", "calm_quorum", consensus.quorum.calm)?,
        elevated: value(adapter, "consensus", "elevated_quorum", consensus.quorum.elevated)?,
    };
    consensus.trade_quantity = value(
        adapter,
        "consensus",
        "trade_quantity",
        consensus.trade_quantity,
    )?;

    let r = RegimeConfig::default();
    let regime = RegimeConfig {
        min_samples: value(adapter, "regime", "min_samples", r.min_samples)?,
        max_iterations: value(adapter, "regime", "max_iterations", r.max_iterations)?,
        tolerance: value(adapter, "regime", "tolerance", r.tolerance)?,
        pattern_window: value(adapter, "regime", "pattern_window", r.pattern_window)?,
        pairs_window: value(adapter, "regime", "pairs_window", r.pairs_window)?,
    };

    let o = &d.oracles;
    let oracles = OracleConfig {
        llm: string_or(adapter, "oracles", "llm", &o.llm),
        regime: string_or(adapter, "oracles", "regime", &o.regime),
        aggressive: string_or(adapter, "oracles", "aggressive", &o.aggressive),
        conservative: string_or(adapter, "oracles", "conservative", &o.conservative),
        seed: value(adapter, "oracles", "seed", o.seed)?,
        crossover: adapter.get_bool("oracles", "crossover", o.crossover),
        crossover_name: string_or(adapter, "oracles", "crossover_name", &o.crossover_name),
        short_window: value(adapter, "oracles", "short_window", o.short_window)?,
        long_window: value(adapter, "oracles", "long_window", o.long_window)?,
    };

    let volatility = match adapter.get_string("macro", "volatility") {
        None => None,
        Some(raw) => Some(VolatilityRegime::parse(&raw).ok_or_else(|| {
            invalid("macro", "volatility", format!("unknown volatility regime '{raw}'"))
        })?),
    };
    let outlook = MacroOutlook::resolve(
        value(adapter, "macro", "cycle_percentile", d.outlook.cycle_percentile)?,
        volatility,
    );

    let dd = &d.data;
    let data = DataConfig {
        price_dir: PathBuf::from(string_or(
            adapter,
            "data",
            "price_dir",
            &dd.price_dir.to_string_lossy(),
        )),
        news_dir: PathBuf::from(string_or(
            adapter,
            "data",
            "news_dir",
            &dd.news_dir.to_string_lossy(),
        )),
        period: string_or(adapter, "data", "period", &dd.period),
        interval: string_or(adapter, "data", "interval", &dd.interval),
        news_categories: list_of(adapter, "data", "news_categories", dd.news_categories.clone())?,
        output: PathBuf::from(string_or(
            adapter,
            "data",
            "output",
            &dd.output.to_string_lossy(),
        )),
    };

    let schedule = ScheduleConfig {
        interval: Duration::from_secs(value(
            adapter,
            "schedule",
            "interval_secs",
            d.schedule.interval.as_secs(),
        )?),
        retry_delay: Duration::from_secs(value(
            adapter,
            "schedule",
            "retry_secs",
            d.schedule.retry_delay.as_secs(),
        )?),
        max_passes: match adapter.get_string("schedule", "max_passes") {
            None => None,
            Some(_) => Some(value(adapter, "schedule", "max_passes", 0u64)?),
        },
    };

    let t = &d.training;
    let training = TrainingPlan {
        symbols: list_of(adapter, "training", "symbols", default_training_symbols())?,
        stop_losses: list_of(adapter, "training", "stop_losses", t.stop_losses.clone())?,
        rsi_windows: list_of(adapter, "training", "rsi_windows", t.rsi_windows.clone())?,
        news_categories: list_of(adapter, "training", "categories", t.news_categories.clone())?,
        period: string_or(adapter, "training", "period", &t.period),
        interval: string_or(adapter, "training", "interval", &t.interval),
    };

    Ok(DeskConfig {
        ledger,
        guardrail,
        ethical_screen: adapter.get_bool("guardrail", "ethical_screen", d.ethical_screen),
        ethics_min_score: value(adapter, "guardrail", "ethics_min_score", d.ethics_min_score)?,
        consensus,
        regime,
        oracles,
        outlook,
        data,
        universe: resolve_universe(adapter),
        schedule,
        training,
    })
}

/// Collaborators a cycle or training run talks to.
pub struct Collaborators<'a> {
    pub prices: &'a dyn PricePort,
    pub news: &'a dyn NewsPort,
    pub clock: &'a dyn Clock,
    pub telemetry: &'a dyn TelemetryPort,
}

/// Builds a fresh desk, runs one cycle and writes the run state to `output`.
pub fn run_cycle_pipeline(
    config: &DeskConfig,
    judge: Box<dyn JudgePort>,
    io: &Collaborators<'_>,
    writer: &dyn RunStatePort,
    output: &Path,
) -> Result<CycleReport, DeskError> {
    let engine = ConsensusEngine::new(config.oracles(judge), config.consensus.clone());
    let mut desk = TradingDesk::new(
        Ledger::new(config.ledger.clone()),
        config.guardrail(),
        engine,
    );
    let status = desk.ledger().status(&Default::default());
    tracing::info!(tier = %status.tier, cash = status.cash, "desk opened");

    let plan = config.cycle_plan();
    let sources = CycleSources {
        prices: io.prices,
        news: io.news,
        clock: io.clock,
        telemetry: io.telemetry,
    };
    let report = desk.run_cycle(&plan, &sources)?;
    let state = desk.run_state(&report, &plan, io.clock);
    writer.write(&state, &output.to_string_lossy())?;
    tracing::info!(path = %output.display(), "run state written");
    Ok(report)
}

/// Runs training passes under the scheduler. Without `repeat` exactly one
/// pass is attempted.
pub fn run_training_schedule(
    config: &DeskConfig,
    repeat: bool,
    max_passes: Option<u64>,
    io: &Collaborators<'_>,
    cancel: CancelToken,
) -> ScheduleSummary {
    let mut schedule = config.schedule.clone();
    schedule.max_passes = if repeat {
        max_passes.or(schedule.max_passes)
    } else {
        Some(1)
    };

    let regime = config.regime_session();
    let ethics = config.ethics_session();
    let sources = TrainingSources {
        prices: io.prices,
        news: io.news,
        telemetry: io.telemetry,
    };
    let scheduler = Scheduler::new(schedule, io.clock, cancel, io.telemetry);
    scheduler.run(|pass| {
        tracing::info!(pass, "training pass started");
        let outcome = run_training_pass(&config.training, &regime, &ethics, &sources)?;
        tracing::info!(
            pass,
            sessions = outcome.reports.len(),
            skipped = outcome.skipped.len(),
            "training pass finished"
        );
        Ok(())
    })
}

fn run_cycle(config_path: &Path, output: Option<&Path>) -> ExitCode {
    let config = match load_desk_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let prices = CsvPriceAdapter::new(config.data.price_dir.clone());
    let news = FileNewsAdapter::new(config.data.news_dir.clone());
    let io = Collaborators {
        prices: &prices,
        news: &news,
        clock: &SystemClock,
        telemetry: &TracingTelemetry,
    };
    let output = output.unwrap_or(config.data.output.as_path());
    let judge = Box::new(OfflineJudge::new(config.oracles.llm.clone()));

    match run_cycle_pipeline(&config, judge, &io, &JsonRunStateAdapter, output) {
        Ok(report) => {
            print_cycle_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_cycle_report(report: &CycleReport) {
    println!("{:<10} {:<8} {:<40} OUTCOME", "SYMBOL", "CATEGORY", "VOTES");
    for outcome in &report.outcomes {
        println!(
            "{:<10} {:<8} {:<40} {}",
            outcome.symbol,
            outcome.category,
            outcome.matrix.to_string(),
            outcome.decision
        );
    }
    println!(
        "\nTrades: {}  Portfolio value: {:.2}  Sentiment mood: {:.1}",
        report.trades,
        report.total_value,
        report.sentiment * 100.0
    );
}

fn run_train(config_path: &Path, repeat: bool, max_passes: Option<u64>) -> ExitCode {
    let config = match load_desk_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let prices = CsvPriceAdapter::new(config.data.price_dir.clone());
    let news = FileNewsAdapter::new(config.data.news_dir.clone());
    let io = Collaborators {
        prices: &prices,
        news: &news,
        clock: &SystemClock,
        telemetry: &TracingTelemetry,
    };

    let summary = run_training_schedule(&config, repeat, max_passes, &io, CancelToken::new());
    eprintln!(
        "Training passes: {} attempted, {} succeeded, {} failed",
        summary.attempts, summary.succeeded, summary.failed
    );
    if summary.attempts > 0 && summary.succeeded == 0 {
        ExitCode::from(5)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_regime(file: &Path, window: Option<usize>, pair: Option<&Path>) -> ExitCode {
    let series = match read_series(file) {
        Ok(s) => closes(&s),
        Err(e) => return fail(&e),
    };
    let mut config = RegimeConfig::default();
    if let Some(w) = window {
        if w < 2 {
            return fail(&invalid("regime", "window", "window must be at least 2".into()));
        }
        config.pattern_window = w;
    }
    let classifier = RegimeClassifier::new(config);

    let estimate = classifier.classify(&series);
    println!("Prices:    {}", series.len());
    println!("Regime:    {}", estimate.label);
    if let Some(reason) = &estimate.fallback {
        println!("Fallback:  {reason}");
    }
    if !estimate.states.is_empty() {
        for label in RegimeLabel::BY_VOLATILITY {
            let count = estimate.states.iter().filter(|s| **s == label).count();
            println!("  {:<16} {count}", label.to_string());
        }
    }
    let forecast = classifier.forecast(&series);
    println!(
        "Forecast:  {} ({:+.4}%)",
        if forecast > 0.0 { "UP" } else { "DOWN" },
        forecast * 100.0
    );

    if let Some(pair) = pair {
        let other = match read_series(pair) {
            Ok(s) => closes(&s),
            Err(e) => return fail(&e),
        };
        match classifier.pairs_zscore(&series, &other) {
            Some(z) => println!(
                "Pairs z:   {z:.3}{}",
                if is_entry_signal(z) { " (entry signal)" } else { "" }
            ),
            None => println!("Pairs z:   n/a"),
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_desk_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    eprintln!("Universe: {} symbols", config.universe.len());
    eprintln!(
        "Oracles:  {} (quorum {} calm / {} elevated, volatility {})",
        config.oracle_count(),
        config.consensus.quorum.calm,
        config.consensus.quorum.elevated,
        config.outlook.volatility
    );
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}
