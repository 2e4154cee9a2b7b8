//! Plan Tracker - Multi-year pension plan filing reconciliation and trend signals
//!
//! This library provides:
//! - Per-source schema normalization (alias tables, identifier cleanup,
//!   numeric coercion with missing-not-zero semantics)
//! - Multi-key record matching with fallback and merge-quality provenance
//! - Deduplication with a deterministic tie-break
//! - Longitudinal assembly, year-over-year deltas and trailing-window
//!   trend slopes
//! - De-risking, longevity-exposure and peer-benchmark analyzers with a
//!   merged per-plan report

pub mod error;
pub mod ingest;
pub mod longitudinal;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod signals;

// Re-export commonly used types
pub use error::PipelineError;
pub use longitudinal::{LongitudinalSeries, LongitudinalTable, TrendEstimate};
pub use pipeline::{run, PipelineConfig, RunDiagnostics, RunOutput};
pub use schema::{MergeQuality, PlanYearRecord, TrackingId};
pub use signals::{build_report, AnalysisError, PlanReport, SignalThresholds};
