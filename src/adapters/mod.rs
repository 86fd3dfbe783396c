//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod file_news_adapter;
pub mod json_run_state_adapter;
pub mod memory_telemetry;
pub mod offline_judge;
pub mod tracing_telemetry;
