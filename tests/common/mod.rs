#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use tradedesk::domain::error::{DeskError, OracleError};
use tradedesk::domain::vote::{Judgement, Vote};
use tradedesk::ports::judge_port::JudgePort;
use tradedesk::ports::news_port::NewsPort;
pub use tradedesk::ports::price_port::PricePoint;
use tradedesk::ports::price_port::PricePort;

pub fn ts(offset_days: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_704_067_200 + offset_days * 86_400, 0).unwrap()
}

pub fn points(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint {
            timestamp: ts(i as i64),
            close,
        })
        .collect()
}

/// `n` prices rising by `step` from `start`.
pub fn rising(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
    pub calls: RefCell<Vec<String>>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_closes(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.data.insert(symbol.to_string(), points(closes));
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_series(
        &self,
        symbol: &str,
        _period: &str,
        _interval: &str,
    ) -> Result<Vec<PricePoint>, DeskError> {
        self.calls.borrow_mut().push(symbol.to_string());
        if let Some(reason) = self.errors.get(symbol) {
            return Err(DeskError::PriceData {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

pub struct MockNewsPort {
    pub headlines: HashMap<String, Vec<String>>,
}

impl MockNewsPort {
    pub fn new() -> Self {
        Self {
            headlines: HashMap::new(),
        }
    }

    pub fn with_headlines(mut self, category: &str, headlines: &[&str]) -> Self {
        self.headlines.insert(
            category.to_string(),
            headlines.iter().map(|h| h.to_string()).collect(),
        );
        self
    }
}

impl NewsPort for MockNewsPort {
    fn fetch_headlines(&self, category: &str) -> Result<Vec<String>, DeskError> {
        Ok(self.headlines.get(category).cloned().unwrap_or_default())
    }
}

/// Judge returning a fixed action, or unavailable when `action` is `None`.
pub struct ScriptedJudge {
    pub action: Option<Vote>,
    pub confidence: f64,
}

impl ScriptedJudge {
    pub fn buying() -> Self {
        Self {
            action: Some(Vote::Buy),
            confidence: 0.9,
        }
    }

    pub fn offline() -> Self {
        Self {
            action: None,
            confidence: 0.0,
        }
    }
}

impl JudgePort for ScriptedJudge {
    fn judge(&self, _recent_prices: &[f64], _sentiment: f64) -> Result<Judgement, OracleError> {
        match self.action {
            Some(action) => Ok(Judgement {
                action,
                confidence: self.confidence,
                reasoning: "scripted".to_string(),
            }),
            None => Err(OracleError::Unavailable {
                oracle: "scripted".to_string(),
                reason: "offline".to_string(),
            }),
        }
    }
}
