//! Short-horizon occupancy forecasting.
//!
//! - [`gbt`]: deterministic gradient-boosted regression trees
//! - [`calibration`]: split-conformal interval offsets
//! - [`model`]: the dual-target model with its low-data fallback
//! - [`horizon`]: future timestamp grids
//! - [`service`]: fetch, fit and predict for a venue

pub mod calibration;
pub mod gbt;
pub mod horizon;
pub mod model;
pub mod service;

pub use calibration::{Band, IntervalOffsets};
pub use gbt::{BoostingParams, GradientBoostedTrees};
pub use horizon::{night_horizon, periods_per_hour, rolling_horizon, Horizon};
pub use model::{FitMode, ForecastModel, IntervalPrediction, ModelOutput, ModelParams};
pub use service::{ForecastService, ForecastSettings};
