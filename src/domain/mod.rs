//! Core domain types and the backtest engine.

pub mod allocation;
pub mod backtest;
pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod growth;
pub mod metrics;
pub mod momentum;
pub mod price_table;
pub mod series;
pub mod simulation;
pub mod universe;
