//! Signal detection over the longitudinal table
//!
//! Three pure analyzers (de-risking, longevity exposure, peer comparison)
//! plus the per-plan report that merges them. Analyzers are stateless
//! recomputations: nothing persists between runs, and every undefined
//! input is treated as non-triggering rather than as evidence.

pub mod derisking;
pub mod longevity;
pub mod peer;
pub mod report;

use crate::longitudinal::LongitudinalSeries;
use crate::longitudinal::LongitudinalTable;
use crate::schema::TrackingId;
use serde::Serialize;
use thiserror::Error;

pub use derisking::{analyze_derisking, DeriskingSignal};
pub use longevity::{analyze_longevity, LongevitySignal};
pub use peer::{analyze_peers, industry_sector, MetricComparison, PeerComparison};
pub use report::{build_report, PlanReport};

/// Calibration constants for the rule bodies. Thresholds are policy
/// decisions, kept out of the detection logic so recalibration never
/// touches the rules themselves.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SignalThresholds {
    /// Single-year active-count drop treated as sharp (fraction)
    pub sharp_active_decline: f64,
    /// Single-year retiree-share jump (points, as a fraction)
    pub retiree_share_jump: f64,
    /// Single-year fixed-income allocation jump (points, as a fraction)
    pub fixed_income_shift: f64,
    /// Simultaneous retired-count and retiree-liability drop (fraction)
    pub liability_transfer_drop: f64,
    /// Composite score at or above which a plan is flagged as de-risking
    pub derisking_score_cutoff: u32,
    /// Relative excess over the peer-mean annuitant ratio treated as
    /// high longevity exposure
    pub high_longevity_margin: f64,
    /// Absolute z-score at or above which a peer metric is an outlier
    pub peer_outlier_z: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            sharp_active_decline: 0.15,
            retiree_share_jump: 0.05,
            fixed_income_shift: 0.10,
            liability_transfer_drop: 0.10,
            derisking_score_cutoff: 2,
            high_longevity_margin: 0.15,
            peer_outlier_z: 2.0,
        }
    }
}

/// Per-entity analysis failures, distinct from pipeline errors: the
/// longitudinal table is fine, the requested entity just cannot be
/// analyzed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no plan with tracking id {entity}")]
    NotFound { entity: String },

    #[error("plan {entity} has {years} filed year(s); at least 2 required")]
    InsufficientHistory { entity: String, years: usize },
}

/// Entity lookup shared by the analyzers: missing plan and short history
/// are distinct, explicit failures, never an empty-but-successful result.
pub(crate) fn require_series<'a>(
    table: &'a LongitudinalTable,
    tracking_id: &TrackingId,
) -> Result<&'a LongitudinalSeries, AnalysisError> {
    let series = table.get(tracking_id).ok_or_else(|| AnalysisError::NotFound {
        entity: tracking_id.to_string(),
    })?;
    if series.len() < 2 {
        return Err(AnalysisError::InsufficientHistory {
            entity: tracking_id.to_string(),
            years: series.len(),
        });
    }
    Ok(series)
}
