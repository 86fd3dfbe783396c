//! Range checks on a built [`DeskConfig`].
//!
//! Parsing errors are caught while building; this pass rejects values that
//! parse but make no sense together.

use crate::domain::config::{DeskConfig, PERIODS};
use crate::domain::error::DeskError;

fn invalid(section: &str, key: &str, reason: &str) -> DeskError {
    DeskError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_desk_config(config: &DeskConfig) -> Result<(), DeskError> {
    validate_ledger(config)?;
    validate_guardrail(config)?;
    validate_consensus(config)?;
    validate_regime(config)?;
    validate_oracles(config)?;
    validate_macro(config)?;
    validate_data(config)?;
    validate_universe(config)?;
    validate_schedule(config)?;
    validate_training(config)?;
    Ok(())
}

fn validate_ledger(config: &DeskConfig) -> Result<(), DeskError> {
    let ledger = &config.ledger;
    if !(ledger.initial_cash > 0.0) || !ledger.initial_cash.is_finite() {
        return Err(invalid(
            "ledger",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    if !(0.0..1.0).contains(&ledger.fees.commission_rate) {
        return Err(invalid(
            "ledger",
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    if !(0.0..1.0).contains(&ledger.fees.slippage_rate) {
        return Err(invalid(
            "ledger",
            "slippage_rate",
            "slippage_rate must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_guardrail(config: &DeskConfig) -> Result<(), DeskError> {
    let g = &config.guardrail;
    if !(g.max_drawdown > 0.0 && g.max_drawdown <= 1.0) {
        return Err(invalid(
            "guardrail",
            "max_drawdown",
            "max_drawdown must be in (0, 1]",
        ));
    }
    if !(g.max_position_fraction > 0.0 && g.max_position_fraction <= 1.0) {
        return Err(invalid(
            "guardrail",
            "max_position_fraction",
            "max_position_fraction must be in (0, 1]",
        ));
    }
    if config.ethics_min_score > 100 {
        return Err(invalid(
            "guardrail",
            "ethics_min_score",
            "ethics_min_score must be at most 100",
        ));
    }
    Ok(())
}

fn validate_consensus(config: &DeskConfig) -> Result<(), DeskError> {
    let quorum = &config.consensus.quorum;
    let voters = config.oracle_count();
    for (key, value) in [("calm_quorum", quorum.calm), ("elevated_quorum", quorum.elevated)] {
        if value == 0 || value > voters {
            return Err(invalid(
                "consensus",
                key,
                &format!("{key} must be between 1 and the number of oracles ({voters})"),
            ));
        }
    }
    let qty = config.consensus.trade_quantity;
    if !(qty > 0.0) || !qty.is_finite() {
        return Err(invalid(
            "consensus",
            "trade_quantity",
            "trade_quantity must be positive",
        ));
    }
    Ok(())
}

fn validate_regime(config: &DeskConfig) -> Result<(), DeskError> {
    let r = &config.regime;
    if r.min_samples < 3 {
        return Err(invalid("regime", "min_samples", "min_samples must be at least 3"));
    }
    if r.max_iterations == 0 {
        return Err(invalid(
            "regime",
            "max_iterations",
            "max_iterations must be at least 1",
        ));
    }
    if !(r.tolerance > 0.0) {
        return Err(invalid("regime", "tolerance", "tolerance must be positive"));
    }
    if r.pattern_window < 2 {
        return Err(invalid(
            "regime",
            "pattern_window",
            "pattern_window must be at least 2",
        ));
    }
    if r.pairs_window < 2 {
        return Err(invalid(
            "regime",
            "pairs_window",
            "pairs_window must be at least 2",
        ));
    }
    Ok(())
}

fn validate_oracles(config: &DeskConfig) -> Result<(), DeskError> {
    let o = &config.oracles;
    let mut names = vec![&o.llm, &o.regime, &o.aggressive, &o.conservative];
    if o.crossover {
        names.push(&o.crossover_name);
    }
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(invalid("oracles", "names", "oracle names must not be empty"));
    }
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != names.len() {
        return Err(invalid("oracles", "names", "oracle names must be unique"));
    }
    if o.crossover && (o.short_window == 0 || o.short_window >= o.long_window) {
        return Err(invalid(
            "oracles",
            "short_window",
            "short_window must be positive and below long_window",
        ));
    }
    Ok(())
}

fn validate_macro(config: &DeskConfig) -> Result<(), DeskError> {
    if !(0.0..=100.0).contains(&config.outlook.cycle_percentile) {
        return Err(invalid(
            "macro",
            "cycle_percentile",
            "cycle_percentile must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_data(config: &DeskConfig) -> Result<(), DeskError> {
    if !PERIODS.contains(&config.data.period.as_str()) {
        return Err(invalid(
            "data",
            "period",
            &format!("period must be one of {}", PERIODS.join(", ")),
        ));
    }
    if !PERIODS.contains(&config.training.period.as_str()) {
        return Err(invalid(
            "training",
            "period",
            &format!("period must be one of {}", PERIODS.join(", ")),
        ));
    }
    Ok(())
}

fn validate_universe(config: &DeskConfig) -> Result<(), DeskError> {
    if config.universe.is_empty() {
        return Err(DeskError::ConfigMissing {
            section: "universe".to_string(),
            key: "stocks".to_string(),
        });
    }
    Ok(())
}

fn validate_schedule(config: &DeskConfig) -> Result<(), DeskError> {
    if config.schedule.interval.is_zero() {
        return Err(invalid(
            "schedule",
            "interval_secs",
            "interval_secs must be positive",
        ));
    }
    if config.schedule.max_passes == Some(0) {
        return Err(invalid(
            "schedule",
            "max_passes",
            "max_passes must be at least 1",
        ));
    }
    Ok(())
}

fn validate_training(config: &DeskConfig) -> Result<(), DeskError> {
    let t = &config.training;
    if t.stop_losses.iter().any(|s| !(*s > 0.0 && *s < 1.0)) {
        return Err(invalid(
            "training",
            "stop_losses",
            "stop_losses must be in (0, 1)",
        ));
    }
    if t.rsi_windows.contains(&0) {
        return Err(invalid(
            "training",
            "rsi_windows",
            "rsi_windows must be positive",
        ));
    }
    Ok(())
}
