//! # Occupancy Rust Core
//!
//! Venue occupancy analytics engine.
//!
//! This crate turns noisy, irregularly sampled occupancy snapshots (head
//! counts of two population segments, "men" and "women") into short-horizon
//! forecasts with a calibrated uncertainty band, and finds the stretches of
//! past nights that sustained a high quality score.
//!
//! ## Features
//!
//! - **Normalization**: Lenient wire records validated into time-ordered observations
//! - **Aggregation**: Night-window 10-minute bucket averages
//! - **Forecasting**: Gradient-boosted trees per target with a low-data mean fallback
//!   and split-conformal p10/p50/p90 bands
//! - **Scoring**: Fullness x balance x stability point scores and sustained quality windows
//! - **Reports**: Weekly quality-window insights per venue
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Output types (forecast envelopes, windows, buckets)
//! - [`models`]: Observations, raw records and time helpers
//! - [`features`]: Feature table construction for the forecast model
//! - [`forecast`]: Model, horizons and the forecast service
//! - [`scoring`]: Quality scorer and window segmenter
//! - [`services`]: Aggregation and weekly insight reports
//! - [`source`]: Data source trait and local implementations
//! - [`config`]: TOML configuration with environment overrides
//!

// Allow large error types - SourceError carries rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod models;
pub mod scoring;
pub mod services;
pub mod source;

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, AnalyticsResult, ConfigError};
