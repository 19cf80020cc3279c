//! Service layer for analytics over normalized observations.
//!
//! Services sit between the data sources and the output types: they combine
//! the scoring and aggregation primitives into the reports callers consume.

pub mod aggregation;
pub mod insights;

pub use aggregation::Aggregator;
pub use insights::InsightService;
