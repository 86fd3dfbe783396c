//! Core domain types and logic.

pub mod error;
pub mod vote;
pub mod position;
pub mod ledger;
pub mod guardrail;
pub mod indicator;
pub mod regime;
pub mod outlook;
pub mod sentiment;
pub mod ethics;
pub mod oracle;
pub mod consensus;
pub mod scheduler;
pub mod training;
pub mod run_state;
pub mod cycle;
pub mod config;
pub mod config_validation;
