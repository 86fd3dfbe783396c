//! Telemetry sink that forwards events to `tracing`.

use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetryPort for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::SymbolSkipped { symbol, reason } => {
                tracing::info!(%symbol, %reason, "symbol skipped");
            }
            TelemetryEvent::NewsFallback { category, reason } => {
                tracing::warn!(%category, %reason, "news source failed, using neutral headlines");
            }
            TelemetryEvent::VoteFallback {
                symbol,
                oracle,
                reason,
            } => {
                tracing::warn!(%symbol, %oracle, %reason, "oracle fell back to heuristic");
            }
            TelemetryEvent::QuorumMissed {
                symbol,
                buys,
                required,
            } => {
                tracing::debug!(%symbol, buys, required, "quorum not reached");
            }
            TelemetryEvent::AlreadyHeld { symbol } => {
                tracing::debug!(%symbol, "quorum reached but position already open");
            }
            TelemetryEvent::TradeRejected { symbol, reason } => {
                tracing::warn!(%symbol, %reason, "trade rejected");
            }
            TelemetryEvent::TradeExecuted {
                symbol,
                side,
                quantity,
                price,
                trigger,
            } => {
                tracing::info!(%symbol, %side, quantity, price, %trigger, "trade executed");
            }
            TelemetryEvent::CycleCompleted {
                trades,
                total_value,
            } => {
                tracing::info!(trades, total_value, "cycle completed");
            }
            TelemetryEvent::SessionCompleted {
                session,
                parameters,
                performance,
                notes,
            } => {
                tracing::info!(
                    %session,
                    %parameters,
                    performance = %format!("{performance:.2}%"),
                    %notes,
                    "training session completed"
                );
            }
            TelemetryEvent::PassFailed { pass, reason } => {
                tracing::warn!(pass, %reason, "pass failed");
            }
            TelemetryEvent::PassCompleted { pass } => {
                tracing::info!(pass, "pass completed");
            }
        }
    }
}
