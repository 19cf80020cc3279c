//! Quality scoring of historical points and detection of sustained
//! high-quality windows.

pub mod scorer;
pub mod segmenter;

pub use scorer::{clamp01, gender_balance, occupancy_alignment, OccupancyScorer, ScoreInput};
pub use segmenter::WindowSegmenter;
