//! Core domain types and logic.

pub mod aggregation;
pub mod analyzer;
pub mod config_validation;
pub mod error;
pub mod metrics;
pub mod monte_carlo;
pub mod optimizer;
pub mod table;
pub mod trade;
