//! Longevity exposure analyzer
//!
//! Longevity risk concentrates where a sponsor expects its population to
//! outlive standard tables: substitute mortality assumptions, a rising or
//! elevated annuitant ratio. Peer context comes from the same sector
//! cohort the benchmark analyzer uses.

use crate::longitudinal::{trend_estimate, LongitudinalTable, Metric, TrendEstimate};
use crate::schema::{MortalityBasis, TrackingId};
use crate::signals::peer::{cohort, industry_sector};
use crate::signals::{require_series, AnalysisError, SignalThresholds};
use serde::Serialize;

/// Annuitant ratio observed (or absent) for one filed year.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RatioObservation {
    pub year: i32,
    pub ratio: Option<f64>,
}

/// Longevity exposure assessment for one plan.
#[derive(Debug, Clone, Serialize)]
pub struct LongevitySignal {
    pub tracking_id: TrackingId,
    /// Latest filed year uses a substitute mortality table
    pub substitute_mortality_latest: bool,
    /// Every year that reports a basis reports substitute, across 2+ years
    pub persistent_substitute_mortality: bool,
    pub annuitant_ratio_path: Vec<RatioObservation>,
    /// 5-window trend of the annuitant ratio
    pub annuitant_ratio_trend: TrendEstimate,
    /// Cohort mean in the plan's latest year; undefined with no cohort
    pub peer_mean_annuitant_ratio: Option<f64>,
    /// Latest ratio exceeds the cohort mean by the configured margin;
    /// undefined when either side is undefined
    pub high_longevity_exposure: Option<bool>,
    /// Count of: latest substitute basis, persistent substitute basis,
    /// rising annuitant ratio, confirmed high exposure
    pub composite_score: u32,
}

/// Run the longevity rules for one plan. Undefined inputs never score.
pub fn analyze_longevity(
    table: &LongitudinalTable,
    tracking_id: &TrackingId,
    thresholds: &SignalThresholds,
) -> Result<LongevitySignal, AnalysisError> {
    let series = require_series(table, tracking_id)?;
    let latest = &series.records[series.records.len() - 1];

    let substitute_mortality_latest =
        latest.mortality_basis == Some(MortalityBasis::Substitute);
    let reported: Vec<MortalityBasis> = series
        .records
        .iter()
        .filter_map(|r| r.mortality_basis)
        .collect();
    let persistent_substitute_mortality = reported.len() >= 2
        && reported.iter().all(|b| *b == MortalityBasis::Substitute);

    let annuitant_ratio_path: Vec<RatioObservation> = series
        .records
        .iter()
        .map(|r| RatioObservation {
            year: r.year,
            ratio: r.annuitant_ratio(),
        })
        .collect();
    let annuitant_ratio_trend = trend_estimate(series, Metric::AnnuitantRatio, 5);

    let peer_mean_annuitant_ratio = latest
        .industry_code
        .as_deref()
        .and_then(industry_sector)
        .and_then(|sector| {
            let ratios: Vec<f64> = cohort(table, tracking_id, sector, latest.year)
                .iter()
                .filter_map(|p| p.annuitant_ratio())
                .collect();
            if ratios.is_empty() {
                None
            } else {
                Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
            }
        });
    let high_longevity_exposure = match (latest.annuitant_ratio(), peer_mean_annuitant_ratio) {
        (Some(own), Some(peer_mean)) => {
            Some(own > peer_mean * (1.0 + thresholds.high_longevity_margin))
        }
        _ => None,
    };

    let composite_score = [
        substitute_mortality_latest,
        persistent_substitute_mortality,
        annuitant_ratio_trend.slope.is_some_and(|s| s > 0.0),
        high_longevity_exposure == Some(true),
    ]
    .iter()
    .filter(|&&flag| flag)
    .count() as u32;

    Ok(LongevitySignal {
        tracking_id: tracking_id.clone(),
        substitute_mortality_latest,
        persistent_substitute_mortality,
        annuitant_ratio_path,
        annuitant_ratio_trend,
        peer_mean_annuitant_ratio,
        high_longevity_exposure,
        composite_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::longitudinal::LongitudinalTable;
    use crate::schema::{
        LiabilityAmounts, MergeQuality, ParticipantCounts, PlanYearRecord, SourcePresence,
    };
    use approx::assert_relative_eq;

    fn record(
        ein: &str,
        year: i32,
        retired: i64,
        total: i64,
        basis: Option<MortalityBasis>,
        industry: Option<&str>,
    ) -> PlanYearRecord {
        PlanYearRecord {
            tracking_id: TrackingId::new(ein, "001"),
            employer_id: ein.into(),
            plan_number: "001".into(),
            year,
            filing_key: format!("{ein}-001-{year}"),
            sponsor_name: None,
            plan_name: None,
            industry_code: industry.map(String::from),
            participants: ParticipantCounts {
                active: Some(total - retired),
                retired: Some(retired),
                separated: Some(0),
                total: Some(total),
            },
            liabilities: LiabilityAmounts::default(),
            mortality_basis: basis,
            actuary_firm: None,
            allocation: Default::default(),
            annuity_purchases: None,
            insurer_transfers: None,
            benefits_paid: None,
            contributions: None,
            merge_quality: MergeQuality::None,
            sources: SourcePresence {
                actuarial: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_persistent_substitute_mortality() {
        let rows = vec![
            record("111111111", 2020, 200, 1000, Some(MortalityBasis::Substitute), None),
            record("111111111", 2021, 210, 1000, Some(MortalityBasis::Substitute), None),
            record("111111111", 2022, 220, 1000, Some(MortalityBasis::Substitute), None),
        ];
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();
        let id = TrackingId::new("111111111", "001");
        let signal = analyze_longevity(&table, &id, &SignalThresholds::default()).unwrap();
        assert!(signal.substitute_mortality_latest);
        assert!(signal.persistent_substitute_mortality);
        // rising ratio fires too; no peer cohort so exposure is undefined
        assert_eq!(signal.high_longevity_exposure, None);
        assert_eq!(signal.composite_score, 3);
    }

    #[test]
    fn test_basis_switch_breaks_persistence() {
        let rows = vec![
            record("111111111", 2021, 200, 1000, Some(MortalityBasis::Prescribed), None),
            record("111111111", 2022, 200, 1000, Some(MortalityBasis::Substitute), None),
        ];
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();
        let id = TrackingId::new("111111111", "001");
        let signal = analyze_longevity(&table, &id, &SignalThresholds::default()).unwrap();
        assert!(signal.substitute_mortality_latest);
        assert!(!signal.persistent_substitute_mortality);
    }

    #[test]
    fn test_unreported_basis_never_persistent() {
        let rows = vec![
            record("111111111", 2021, 200, 1000, None, None),
            record("111111111", 2022, 200, 1000, Some(MortalityBasis::Substitute), None),
        ];
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();
        let id = TrackingId::new("111111111", "001");
        let signal = analyze_longevity(&table, &id, &SignalThresholds::default()).unwrap();
        assert!(!signal.persistent_substitute_mortality);
    }

    #[test]
    fn test_exposure_against_peer_mean() {
        let mut rows = vec![
            record("111111111", 2021, 480, 1000, None, Some("331110")),
            record("111111111", 2022, 500, 1000, None, Some("331110")),
        ];
        rows.push(record("222222222", 2021, 200, 1000, None, Some("332710")));
        rows.push(record("222222222", 2022, 200, 1000, None, Some("332710")));
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();
        let id = TrackingId::new("111111111", "001");
        let signal = analyze_longevity(&table, &id, &SignalThresholds::default()).unwrap();
        assert_relative_eq!(signal.peer_mean_annuitant_ratio.unwrap(), 0.2);
        // 0.5 > 0.2 * 1.15
        assert_eq!(signal.high_longevity_exposure, Some(true));
    }

    #[test]
    fn test_ratio_path_covers_every_year() {
        let rows = vec![
            record("111111111", 2021, 200, 1000, None, None),
            record("111111111", 2023, 250, 1000, None, None),
        ];
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();
        let id = TrackingId::new("111111111", "001");
        let signal = analyze_longevity(&table, &id, &SignalThresholds::default()).unwrap();
        assert_eq!(signal.annuitant_ratio_path.len(), 2);
        assert_eq!(signal.annuitant_ratio_path[1].year, 2023);
        assert_relative_eq!(signal.annuitant_ratio_path[1].ratio.unwrap(), 0.25);
    }
}
