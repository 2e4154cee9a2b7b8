//! Per-plan analysis report
//!
//! Merges the three analyzer outputs with the plan's identity and latest
//! metadata into one serializable record, plus short human-readable
//! talking points for the flags that fired.

use crate::longitudinal::{standard_trends, LongitudinalTable, TrendEstimate};
use crate::schema::TrackingId;
use crate::signals::{
    analyze_derisking, analyze_longevity, analyze_peers, require_series, AnalysisError,
    DeriskingSignal, LongevitySignal, PeerComparison, SignalThresholds,
};
use serde::Serialize;

/// Full analysis of one plan, the JSON artifact behind the per-entity
/// report command.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub tracking_id: TrackingId,
    pub employer_id: String,
    pub plan_number: String,
    pub sponsor_name: Option<String>,
    pub plan_name: Option<String>,
    pub industry_code: Option<String>,
    pub years: Vec<i32>,
    pub latest_year: i32,
    pub trends: Vec<TrendEstimate>,
    pub derisking: DeriskingSignal,
    pub longevity: LongevitySignal,
    pub peer: PeerComparison,
    pub talking_points: Vec<String>,
}

fn talking_points(
    derisking: &DeriskingSignal,
    longevity: &LongevitySignal,
    peer: &PeerComparison,
) -> Vec<String> {
    let mut points = Vec::new();
    if derisking.is_derisking {
        points.push(format!(
            "De-risking pattern: {} of 4 freeze indicators triggered",
            derisking.composite_score
        ));
    }
    if derisking.liability_transfer_signal {
        let mut point = "Retiree count and retiree liability dropped together, \
             consistent with a pension risk transfer"
            .to_string();
        if derisking.annuity_purchase_evidence {
            point.push_str(" (corroborated by reported annuity purchases)");
        }
        points.push(point);
    }
    if longevity.persistent_substitute_mortality {
        points.push("Substitute mortality table used in every filed year".to_string());
    }
    if longevity.high_longevity_exposure == Some(true) {
        points.push(format!(
            "Annuitant ratio well above the sector cohort mean of {:.3}",
            longevity.peer_mean_annuitant_ratio.unwrap_or(0.0)
        ));
    }
    if peer.composite_score > 0 {
        points.push(format!(
            "Outlier versus sector peers on {} metric(s)",
            peer.composite_score
        ));
    }
    points
}

/// Run all three analyzers for one plan and assemble the report.
pub fn build_report(
    table: &LongitudinalTable,
    tracking_id: &TrackingId,
    thresholds: &SignalThresholds,
) -> Result<PlanReport, AnalysisError> {
    let series = require_series(table, tracking_id)?;
    let latest = &series.records[series.records.len() - 1];

    let derisking = analyze_derisking(table, tracking_id, thresholds)?;
    let longevity = analyze_longevity(table, tracking_id, thresholds)?;
    let peer = analyze_peers(table, tracking_id, thresholds)?;
    let talking_points = talking_points(&derisking, &longevity, &peer);

    Ok(PlanReport {
        tracking_id: tracking_id.clone(),
        employer_id: latest.employer_id.clone(),
        plan_number: latest.plan_number.clone(),
        sponsor_name: latest.sponsor_name.clone(),
        plan_name: latest.plan_name.clone(),
        industry_code: latest.industry_code.clone(),
        years: series.years().collect(),
        latest_year: latest.year,
        trends: standard_trends(series),
        derisking,
        longevity,
        peer,
        talking_points,
    })
}
