//! Market data port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::DeskError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

pub trait PricePort {
    /// Chronologically ordered closes for `symbol`. An empty series means the
    /// symbol is skipped this cycle.
    fn fetch_series(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>, DeskError>;
}

pub fn closes(points: &[PricePoint]) -> Vec<f64> {
    points.iter().map(|p| p.close).collect()
}
