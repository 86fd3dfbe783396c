//! Telemetry sink port trait.

use crate::domain::position::Side;

/// Everything the desk reports about its own behaviour.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    SymbolSkipped {
        symbol: String,
        reason: String,
    },
    NewsFallback {
        category: String,
        reason: String,
    },
    VoteFallback {
        symbol: String,
        oracle: String,
        reason: String,
    },
    QuorumMissed {
        symbol: String,
        buys: usize,
        required: usize,
    },
    AlreadyHeld {
        symbol: String,
    },
    TradeRejected {
        symbol: String,
        reason: String,
    },
    TradeExecuted {
        symbol: String,
        side: Side,
        quantity: f64,
        price: f64,
        trigger: String,
    },
    CycleCompleted {
        trades: usize,
        total_value: f64,
    },
    SessionCompleted {
        session: String,
        parameters: String,
        performance: f64,
        notes: String,
    },
    PassFailed {
        pass: u64,
        reason: String,
    },
    PassCompleted {
        pass: u64,
    },
}

pub trait TelemetryPort {
    fn record(&self, event: TelemetryEvent);
}
