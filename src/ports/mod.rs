//! Port traits for external collaborators.

pub mod config_port;
pub mod judge_port;
pub mod news_port;
pub mod price_port;
pub mod run_state_port;
pub mod telemetry_port;
