//! tradedesk: a simulated multi-oracle trading desk.
//!
//! A cash/position ledger guarded by a drawdown and sizing policy, a hidden
//! Markov regime classifier, and a consensus layer that turns oracle votes
//! into trades. Hexagonal layout: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
