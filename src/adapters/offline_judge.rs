//! Judge used when no LLM backend is configured.

use crate::domain::error::OracleError;
use crate::domain::vote::Judgement;
use crate::ports::judge_port::JudgePort;

#[derive(Debug, Clone)]
pub struct OfflineJudge {
    name: String,
}

impl OfflineJudge {
    pub fn new(name: impl Into<String>) -> Self {
        OfflineJudge { name: name.into() }
    }
}

impl JudgePort for OfflineJudge {
    fn judge(&self, _recent_prices: &[f64], _sentiment: f64) -> Result<Judgement, OracleError> {
        Err(OracleError::Unavailable {
            oracle: self.name.clone(),
            reason: "no judge backend configured".to_string(),
        })
    }
}
