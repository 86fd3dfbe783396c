//! Oracle votes and the per-candidate decision matrix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Buy,
    Sell,
    Hold,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Buy => "BUY",
            Vote::Sell => "SELL",
            Vote::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Vote::Buy),
            "SELL" => Ok(Vote::Sell),
            "HOLD" => Ok(Vote::Hold),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// What an oracle returned for one candidate: a genuine opinion, or the vote
/// its local heuristic produced because the real source failed.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleVote {
    Cast { vote: Vote, confidence: Option<f64> },
    Fallback { vote: Vote, reason: String },
}

impl OracleVote {
    pub fn cast(vote: Vote) -> Self {
        OracleVote::Cast {
            vote,
            confidence: None,
        }
    }

    pub fn vote(&self) -> Vote {
        match self {
            OracleVote::Cast { vote, .. } | OracleVote::Fallback { vote, .. } => *vote,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, OracleVote::Fallback { .. })
    }
}

/// A judgement returned by an external (LLM-backed) judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub action: Vote,
    pub confidence: f64,
    pub reasoning: String,
}

/// Oracle name -> vote, formed once per candidate per cycle.
///
/// There is no mutating API: a matrix is built from an iterator of votes and
/// afterwards only read, compared, or copied verbatim into audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionMatrix(BTreeMap<String, Vote>);

impl DecisionMatrix {
    pub fn get(&self, oracle: &str) -> Option<Vote> {
        self.0.get(oracle).copied()
    }

    pub fn count(&self, vote: Vote) -> usize {
        self.0.values().filter(|v| **v == vote).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vote)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, Vote)> for DecisionMatrix {
    fn from_iter<I: IntoIterator<Item = (S, Vote)>>(iter: I) -> Self {
        DecisionMatrix(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for DecisionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, vote)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {vote}")?;
        }
        f.write_str("}")
    }
}
