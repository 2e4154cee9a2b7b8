//! Peer benchmark analyzer
//!
//! Compares a plan's latest-year metrics against a cohort of plans in the
//! same industry sector with a record for the same year. All peer-relative
//! outputs are undefined with an empty cohort or zero dispersion, never
//! defaulted to zero or the median.

use crate::longitudinal::{LongitudinalSeries, LongitudinalTable};
use crate::schema::{MortalityBasis, PlanYearRecord, TrackingId};
use crate::signals::{require_series, AnalysisError, SignalThresholds};
use serde::Serialize;

/// Two-digit NAICS sector prefix of an industry code, the cohort grouping
/// key. Codes shorter than two digits have no sector.
pub fn industry_sector(industry_code: &str) -> Option<&str> {
    let code = industry_code.trim();
    let bytes = code.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() {
        Some(&code[..2])
    } else {
        None
    }
}

/// One metric compared against the cohort.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricComparison {
    pub value: Option<f64>,
    pub peer_mean: Option<f64>,
    /// Sample standard deviation (n − 1) over the peers
    pub peer_std: Option<f64>,
    /// Undefined with fewer than 2 peers or zero dispersion
    pub z_score: Option<f64>,
    /// Fraction of peers strictly below the plan's value
    pub percentile: Option<f64>,
    pub peer_count: usize,
}

fn compare(value: Option<f64>, peer_values: &[f64], outlier_z: f64) -> (MetricComparison, bool) {
    let n = peer_values.len();
    let mean = (n > 0).then(|| peer_values.iter().sum::<f64>() / n as f64);
    let std = (n >= 2).then(|| {
        let m = mean.unwrap_or(0.0);
        let ss: f64 = peer_values.iter().map(|v| (v - m) * (v - m)).sum();
        (ss / (n - 1) as f64).sqrt()
    });
    let z_score = match (value, mean, std) {
        (Some(v), Some(m), Some(s)) if s > 0.0 => Some((v - m) / s),
        _ => None,
    };
    let percentile = match (value, n) {
        (Some(v), n) if n > 0 => {
            Some(peer_values.iter().filter(|&&p| p < v).count() as f64 / n as f64)
        }
        _ => None,
    };
    let outlier = z_score.is_some_and(|z| z.abs() >= outlier_z);
    (
        MetricComparison {
            value,
            peer_mean: mean,
            peer_std: std,
            z_score,
            percentile,
            peer_count: n,
        },
        outlier,
    )
}

/// Peer benchmark for one plan against its sector cohort.
#[derive(Debug, Clone, Serialize)]
pub struct PeerComparison {
    pub tracking_id: TrackingId,
    pub sector: Option<String>,
    /// Latest filed year of the plan; the cohort is drawn from this year
    pub comparison_year: i32,
    pub peer_count: usize,
    pub annuitant_ratio: MetricComparison,
    pub liability_per_active: MetricComparison,
    pub liability_per_annuitant: MetricComparison,
    /// Plan uses a different mortality basis than most of its cohort;
    /// undefined when either side has no reported basis
    pub mortality_basis_differs: Option<bool>,
    /// Count of metrics where the plan is a z-score outlier
    pub composite_score: u32,
}

/// Peer records in `sector` with a filing for `year`, excluding the
/// entity itself.
pub(crate) fn cohort<'a>(
    table: &'a LongitudinalTable,
    tracking_id: &TrackingId,
    sector: &str,
    year: i32,
) -> Vec<&'a PlanYearRecord> {
    table
        .series
        .values()
        .filter(|s| s.tracking_id != *tracking_id)
        .filter_map(|s| s.record_for_year(year))
        .filter(|r| {
            r.industry_code
                .as_deref()
                .and_then(industry_sector)
                .is_some_and(|s| s == sector)
        })
        .collect()
}

fn latest_sector(series: &LongitudinalSeries) -> Option<String> {
    series
        .records
        .iter()
        .rev()
        .find_map(|r| r.industry_code.as_deref().and_then(industry_sector))
        .map(String::from)
}

fn majority_basis(peers: &[&PlanYearRecord]) -> Option<MortalityBasis> {
    let substitute = peers
        .iter()
        .filter(|p| p.mortality_basis == Some(MortalityBasis::Substitute))
        .count();
    let prescribed = peers
        .iter()
        .filter(|p| p.mortality_basis == Some(MortalityBasis::Prescribed))
        .count();
    if substitute + prescribed == 0 {
        None
    } else if substitute > prescribed {
        Some(MortalityBasis::Substitute)
    } else {
        Some(MortalityBasis::Prescribed)
    }
}

/// Benchmark one plan's latest year against its sector cohort.
pub fn analyze_peers(
    table: &LongitudinalTable,
    tracking_id: &TrackingId,
    thresholds: &SignalThresholds,
) -> Result<PeerComparison, AnalysisError> {
    let series = require_series(table, tracking_id)?;
    // Non-empty is guaranteed past require_series
    let latest = &series.records[series.records.len() - 1];
    let sector = latest_sector(series);

    let peers = match &sector {
        Some(sector) => cohort(table, tracking_id, sector, latest.year),
        None => Vec::new(),
    };

    let peer_metric = |extract: fn(&PlanYearRecord) -> Option<f64>| -> Vec<f64> {
        peers.iter().filter_map(|p| extract(p)).collect()
    };
    let (annuitant_ratio, o1) = compare(
        latest.annuitant_ratio(),
        &peer_metric(PlanYearRecord::annuitant_ratio),
        thresholds.peer_outlier_z,
    );
    let (liability_per_active, o2) = compare(
        latest.liability_per_active(),
        &peer_metric(PlanYearRecord::liability_per_active),
        thresholds.peer_outlier_z,
    );
    let (liability_per_annuitant, o3) = compare(
        latest.liability_per_annuitant(),
        &peer_metric(PlanYearRecord::liability_per_annuitant),
        thresholds.peer_outlier_z,
    );

    let mortality_basis_differs = match (latest.mortality_basis, majority_basis(&peers)) {
        (Some(own), Some(cohort)) => Some(own != cohort),
        _ => None,
    };

    Ok(PeerComparison {
        tracking_id: tracking_id.clone(),
        sector,
        comparison_year: latest.year,
        peer_count: peers.len(),
        annuitant_ratio,
        liability_per_active,
        liability_per_annuitant,
        mortality_basis_differs,
        composite_score: [o1, o2, o3].iter().filter(|&&o| o).count() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::longitudinal::LongitudinalTable;
    use crate::schema::{LiabilityAmounts, MergeQuality, ParticipantCounts, SourcePresence};
    use approx::assert_relative_eq;

    fn record(ein: &str, year: i32, retired: i64, total: i64, industry: Option<&str>) -> PlanYearRecord {
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
            liabilities: LiabilityAmounts {
                retired: Some(retired as f64 * 1.0e5),
                total: Some(total as f64 * 1.0e5),
                ..Default::default()
            },
            mortality_basis: None,
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

    fn plan(ein: &str, retired: i64, total: i64, industry: Option<&str>) -> Vec<PlanYearRecord> {
        vec![
            record(ein, 2021, retired, total, industry),
            record(ein, 2022, retired, total, industry),
        ]
    }

    #[test]
    fn test_sector_is_two_digit_prefix() {
        assert_eq!(industry_sector("332710"), Some("33"));
        assert_eq!(industry_sector(" 541110 "), Some("54"));
        assert_eq!(industry_sector("3"), None);
        assert_eq!(industry_sector("XX1234"), None);
        assert_eq!(industry_sector(""), None);
    }

    #[test]
    fn test_cohort_same_sector_same_year() {
        let mut rows = plan("111111111", 200, 1000, Some("331110"));
        rows.extend(plan("222222222", 300, 1000, Some("332710")));
        rows.extend(plan("333333333", 400, 1000, Some("541110")));
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();

        let id = TrackingId::new("111111111", "001");
        let result = analyze_peers(&table, &id, &SignalThresholds::default()).unwrap();
        assert_eq!(result.sector.as_deref(), Some("33"));
        assert_eq!(result.peer_count, 1);
    }

    #[test]
    fn test_zero_peers_leaves_comparison_undefined() {
        let mut rows = plan("111111111", 200, 1000, Some("331110"));
        rows.extend(plan("222222222", 300, 1000, Some("541110")));
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();

        let id = TrackingId::new("111111111", "001");
        let result = analyze_peers(&table, &id, &SignalThresholds::default()).unwrap();
        assert_eq!(result.peer_count, 0);
        assert_eq!(result.annuitant_ratio.z_score, None);
        assert_eq!(result.annuitant_ratio.percentile, None);
        assert_eq!(result.composite_score, 0);
    }

    #[test]
    fn test_zero_dispersion_z_undefined_percentile_defined() {
        let mut rows = plan("111111111", 500, 1000, Some("331110"));
        rows.extend(plan("222222222", 200, 1000, Some("332710")));
        rows.extend(plan("333333333", 200, 1000, Some("333220")));
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();

        let id = TrackingId::new("111111111", "001");
        let result = analyze_peers(&table, &id, &SignalThresholds::default()).unwrap();
        assert_eq!(result.annuitant_ratio.z_score, None);
        assert_relative_eq!(result.annuitant_ratio.percentile.unwrap(), 1.0);
    }

    #[test]
    fn test_z_score_against_dispersed_cohort() {
        let mut rows = plan("111111111", 400, 1000, Some("331110"));
        rows.extend(plan("222222222", 100, 1000, Some("332710")));
        rows.extend(plan("333333333", 300, 1000, Some("333220")));
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();

        let id = TrackingId::new("111111111", "001");
        let result = analyze_peers(&table, &id, &SignalThresholds::default()).unwrap();
        // peers 0.1 and 0.3: mean 0.2, sample std ~0.1414, z ~1.414
        assert_relative_eq!(
            result.annuitant_ratio.z_score.unwrap(),
            (0.4 - 0.2) / (0.1f64 * 2.0f64.sqrt()),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_mortality_basis_differs_from_cohort() {
        let mut own = plan("111111111", 200, 1000, Some("331110"));
        own[1].mortality_basis = Some(MortalityBasis::Substitute);
        let mut peer = plan("222222222", 200, 1000, Some("332710"));
        peer[1].mortality_basis = Some(MortalityBasis::Prescribed);
        let mut rows = own;
        rows.extend(peer);
        let table = LongitudinalTable::assemble(vec![rows]).unwrap();

        let id = TrackingId::new("111111111", "001");
        let result = analyze_peers(&table, &id, &SignalThresholds::default()).unwrap();
        assert_eq!(result.mortality_basis_differs, Some(true));
    }
}
