//! Multi-year series assembly and derived statistics
//!
//! Joins the per-year deduplicated tables into one table keyed by tracking
//! id, computes year-over-year deltas, trailing-window trend slopes, and
//! the per-sponsor rollup artifact.

pub mod assembler;
pub mod rollup;
pub mod trend;

pub use assembler::{LongitudinalSeries, LongitudinalTable, YearDeltas};
pub use rollup::{build_rollup, SponsorYearRollup};
pub use trend::{standard_trends, trend_estimate, Metric, TrendEstimate, TREND_WINDOWS};
