//! External judgement (LLM) port trait.

use crate::domain::error::OracleError;
use crate::domain::vote::Judgement;

pub trait JudgePort {
    fn judge(&self, recent_prices: &[f64], sentiment: f64) -> Result<Judgement, OracleError>;
}
