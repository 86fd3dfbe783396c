//! Domain error types.

/// Rejections raised by the ledger. Recoverable: the caller simply does not
/// trade and may retry with different sizing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient holdings of {symbol}: requested {requested}, held {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("invalid order for {symbol}: {reason}")]
    InvalidOrder { symbol: String, reason: String },
}

/// Risk-policy rejections. Expected and non-fatal; reported to the cycle
/// driver for logging.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardrailRejection {
    #[error(
        "max drawdown of {:.1}% exceeded ({:.2}% below peak); trading halted",
        .limit * 100.0,
        .drawdown * 100.0
    )]
    DrawdownExceeded { drawdown: f64, limit: f64 },

    #[error(
        "trade size {cost:.2} exceeds {:.1}% of portfolio limit ({max_cost:.2})",
        .fraction * 100.0
    )]
    PositionTooLarge {
        cost: f64,
        max_cost: f64,
        fraction: f64,
    },

    #[error("asset {symbol} is on the restricted list")]
    RestrictedAsset { symbol: String },
}

/// Regime model fitting failures. Never surfaced past the classifier, which
/// substitutes its neutral fallback label.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("degenerate returns: {reason}")]
    Degenerate { reason: String },

    #[error("log-likelihood became non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("no convergence after {iterations} iterations")]
    NonConvergence { iterations: usize },
}

/// Failures of an external oracle. Recovered by each oracle's heuristic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle {oracle} unavailable: {reason}")]
    Unavailable { oracle: String, reason: String },

    #[error("oracle {oracle} returned a malformed judgement: {reason}")]
    Malformed { oracle: String, reason: String },
}

/// Top-level error type for tradedesk.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price data error for {symbol}: {reason}")]
    PriceData { symbol: String, reason: String },

    #[error("run state error: {reason}")]
    RunState { reason: String },

    #[error("training session {session} failed: {reason}")]
    Session { session: String, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&DeskError> for std::process::ExitCode {
    fn from(err: &DeskError) -> Self {
        let code: u8 = match err {
            DeskError::Io(_) => 1,
            DeskError::ConfigParse { .. }
            | DeskError::ConfigMissing { .. }
            | DeskError::ConfigInvalid { .. } => 2,
            DeskError::PriceData { .. } => 3,
            DeskError::RunState { .. } | DeskError::Json(_) => 4,
            DeskError::Session { .. } | DeskError::Ledger(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_message_mentions_drawdown() {
        let err = GuardrailRejection::DrawdownExceeded {
            drawdown: 0.11,
            limit: 0.10,
        };
        let msg = err.to_string();
        assert!(msg.contains("drawdown"));
        assert!(msg.contains("10.0%"));
        assert!(msg.contains("11.00%"));
    }

    #[test]
    fn position_message_mentions_limit() {
        let err = GuardrailRejection::PositionTooLarge {
            cost: 6000.0,
            max_cost: 5000.0,
            fraction: 0.05,
        };
        assert_eq!(
            err.to_string(),
            "trade size 6000.00 exceeds 5.0% of portfolio limit (5000.00)"
        );
    }

    #[test]
    fn restricted_message_names_symbol() {
        let err = GuardrailRejection::RestrictedAsset {
            symbol: "WEAPONS_INC".into(),
        };
        assert!(err.to_string().contains("WEAPONS_INC"));
        assert!(err.to_string().contains("restricted list"));
    }

    #[test]
    fn ledger_error_converts_into_desk_error() {
        let err: DeskError = LedgerError::InsufficientFunds {
            required: 10.0,
            available: 5.0,
        }
        .into();
        assert!(matches!(err, DeskError::Ledger(_)));
        assert_eq!(
            err.to_string(),
            "insufficient funds: need 10.00, have 5.00"
        );
    }
}
