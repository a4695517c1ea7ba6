//! Core domain types and computation.

pub mod asset;
pub mod config_validation;
pub mod error;
pub mod metrics;
pub mod montecarlo;
pub mod ohlcv;
pub mod portfolio;
pub mod preprocess;
pub mod returns;
pub mod universe;
