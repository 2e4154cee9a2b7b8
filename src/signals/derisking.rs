//! De-risking / plan-freeze analyzer
//!
//! Four year-over-year boolean rules scored into an unweighted composite.
//! Annuity purchases corroborate a detected drop year but are reported as
//! evidence only, never scored.

use crate::longitudinal::{trend_estimate, LongitudinalTable, Metric, TrendEstimate, TREND_WINDOWS};
use crate::schema::TrackingId;
use crate::signals::{require_series, AnalysisError, SignalThresholds};
use serde::Serialize;

/// De-risking assessment for one plan.
#[derive(Debug, Clone, Serialize)]
pub struct DeriskingSignal {
    pub tracking_id: TrackingId,
    /// Any single-year active-count drop beyond the threshold
    pub sharp_active_decline: bool,
    /// Any single-year retired/total share jump beyond the threshold
    pub rising_retiree_share: bool,
    /// Any single-year fixed-income allocation jump beyond the threshold
    pub asset_shift_to_fixed_income: bool,
    /// A year where retired count and retiree liability both dropped
    /// beyond the threshold, the pension risk transfer pattern
    pub liability_transfer_signal: bool,
    /// Unweighted count of the four rules above
    pub composite_score: u32,
    pub is_derisking: bool,
    /// A flagged drop year also reported positive annuity purchases.
    /// Corroboration only; not part of the score.
    pub annuity_purchase_evidence: bool,
    pub trends: Vec<TrendEstimate>,
}

const TREND_METRICS: [Metric; 4] = [
    Metric::ActiveCount,
    Metric::RetiredCount,
    Metric::TotalLiability,
    Metric::FixedIncomePct,
];

/// Run the de-risking rules for one plan. Undefined deltas never trigger.
pub fn analyze_derisking(
    table: &LongitudinalTable,
    tracking_id: &TrackingId,
    thresholds: &SignalThresholds,
) -> Result<DeriskingSignal, AnalysisError> {
    let series = require_series(table, tracking_id)?;

    let mut sharp_active_decline = false;
    let mut rising_retiree_share = false;
    let mut asset_shift_to_fixed_income = false;
    let mut liability_transfer_signal = false;
    let mut drop_years = Vec::new();

    for delta in &series.deltas {
        let active_drop = delta
            .active_pct_change
            .is_some_and(|c| c < -thresholds.sharp_active_decline);
        let transfer = delta
            .retired_pct_change
            .is_some_and(|c| c < -thresholds.liability_transfer_drop)
            && delta
                .retiree_liability_pct_change
                .is_some_and(|c| c < -thresholds.liability_transfer_drop);
        sharp_active_decline |= active_drop;
        rising_retiree_share |= delta
            .retiree_share_change
            .is_some_and(|c| c > thresholds.retiree_share_jump);
        asset_shift_to_fixed_income |= delta
            .fixed_income_change
            .is_some_and(|c| c > thresholds.fixed_income_shift);
        liability_transfer_signal |= transfer;
        if active_drop || transfer {
            drop_years.push(delta.year);
        }
    }

    let annuity_purchase_evidence = drop_years.iter().any(|&year| {
        series
            .record_for_year(year)
            .and_then(|r| r.annuity_purchases)
            .is_some_and(|amount| amount > 0.0)
    });

    let composite_score = [
        sharp_active_decline,
        rising_retiree_share,
        asset_shift_to_fixed_income,
        liability_transfer_signal,
    ]
    .iter()
    .filter(|&&flag| flag)
    .count() as u32;

    let trends = TREND_METRICS
        .iter()
        .flat_map(|&metric| TREND_WINDOWS.map(|window| trend_estimate(series, metric, window)))
        .collect();

    Ok(DeriskingSignal {
        tracking_id: tracking_id.clone(),
        sharp_active_decline,
        rising_retiree_share,
        asset_shift_to_fixed_income,
        liability_transfer_signal,
        composite_score,
        is_derisking: composite_score >= thresholds.derisking_score_cutoff,
        annuity_purchase_evidence,
        trends,
    })
}
