//! Trailing-window trend slopes
//!
//! Ordinary least squares over the trailing N available observations of a
//! metric, fitted against a 0-based index of those observations rather than
//! calendar years. Irregular filing gaps therefore reduce the sample count
//! but never stretch the regression axis; slope units are metric units per
//! observation step, not per calendar year.

use crate::longitudinal::assembler::LongitudinalSeries;
use crate::schema::PlanYearRecord;
use serde::Serialize;

/// Trailing windows computed for every metric.
pub const TREND_WINDOWS: [usize; 2] = [3, 5];

/// Metrics the trend estimator and analyzers operate on. Serialized as
/// snake_case keys (`"active_count"`) in the report artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ActiveCount,
    RetiredCount,
    TotalParticipants,
    TotalLiability,
    RetireeLiability,
    AnnuitantRatio,
    FixedIncomePct,
    EquityPct,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::ActiveCount,
        Metric::RetiredCount,
        Metric::TotalParticipants,
        Metric::TotalLiability,
        Metric::RetireeLiability,
        Metric::AnnuitantRatio,
        Metric::FixedIncomePct,
        Metric::EquityPct,
    ];

    /// Observation value for one plan-year, absent when the underlying
    /// fields are absent.
    pub fn extract(&self, record: &PlanYearRecord) -> Option<f64> {
        match self {
            Metric::ActiveCount => record.participants.active.map(|c| c as f64),
            Metric::RetiredCount => record.participants.retired.map(|c| c as f64),
            Metric::TotalParticipants => record.participants.total.map(|c| c as f64),
            Metric::TotalLiability => record.liabilities.total,
            Metric::RetireeLiability => record.liabilities.retired,
            Metric::AnnuitantRatio => record.annuitant_ratio(),
            Metric::FixedIncomePct => record.allocation.fixed_income,
            Metric::EquityPct => record.allocation.equity,
        }
    }
}

/// One fitted slope. `slope` is `None` with fewer than 2 available
/// observations, never zero.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendEstimate {
    pub metric: Metric,
    pub window: usize,
    pub slope: Option<f64>,
    pub sample_count: usize,
}

/// Closed-form OLS slope of `values` against their 0-based index.
fn ols_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    Some(sxy / sxx)
}

/// Fit the trailing-`window` slope of `metric` over a plan's series.
///
/// The window counts available observations: a plan filing 2019, 2021 and
/// 2023 contributes 3 points at indexes 0, 1, 2.
pub fn trend_estimate(series: &LongitudinalSeries, metric: Metric, window: usize) -> TrendEstimate {
    let observations: Vec<f64> = series
        .records
        .iter()
        .filter_map(|r| metric.extract(r))
        .collect();
    let start = observations.len().saturating_sub(window);
    let tail = &observations[start..];
    TrendEstimate {
        metric,
        window,
        slope: ols_slope(tail),
        sample_count: tail.len(),
    }
}

/// All metric/window combinations for one plan, the shape the analyzers
/// and the per-entity report consume.
pub fn standard_trends(series: &LongitudinalSeries) -> Vec<TrendEstimate> {
    let mut estimates = Vec::with_capacity(Metric::ALL.len() * TREND_WINDOWS.len());
    for metric in Metric::ALL {
        for window in TREND_WINDOWS {
            estimates.push(trend_estimate(series, metric, window));
        }
    }
    estimates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::longitudinal::assembler::LongitudinalTable;
    use crate::schema::{
        LiabilityAmounts, MergeQuality, ParticipantCounts, PlanYearRecord, SourcePresence,
        TrackingId,
    };
    use approx::assert_relative_eq;

    fn record(year: i32, active: Option<i64>) -> PlanYearRecord {
        PlanYearRecord {
            tracking_id: TrackingId::new("111111111", "001"),
            employer_id: "111111111".into(),
            plan_number: "001".into(),
            year,
            filing_key: format!("111111111-001-{year}"),
            sponsor_name: None,
            plan_name: None,
            industry_code: None,
            participants: ParticipantCounts {
                active,
                retired: Some(10),
                separated: None,
                total: active.map(|a| a + 10),
            },
            liabilities: LiabilityAmounts::default(),
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

    fn series_of(records: Vec<PlanYearRecord>) -> LongitudinalSeries {
        let table = LongitudinalTable::assemble(vec![records]).unwrap();
        table
            .get(&TrackingId::new("111111111", "001"))
            .unwrap()
            .clone()
    }

    #[test]
    fn test_metric_keys_serialize_snake_case() {
        let est = TrendEstimate {
            metric: Metric::ActiveCount,
            window: 3,
            slope: None,
            sample_count: 1,
        };
        let json = serde_json::to_string(&est).unwrap();
        assert!(json.contains("\"metric\":\"active_count\""), "got {json}");
        assert_eq!(
            serde_json::to_string(&Metric::FixedIncomePct).unwrap(),
            "\"fixed_income_pct\""
        );
    }

    #[test]
    fn test_single_observation_slope_undefined() {
        let series = series_of(vec![record(2021, Some(100))]);
        for window in TREND_WINDOWS {
            let est = trend_estimate(&series, Metric::ActiveCount, window);
            assert_eq!(est.slope, None);
            assert_eq!(est.sample_count, 1);
        }
    }

    #[test]
    fn test_linear_series_recovers_slope() {
        let series = series_of(vec![
            record(2019, Some(100)),
            record(2020, Some(90)),
            record(2021, Some(80)),
        ]);
        let est = trend_estimate(&series, Metric::ActiveCount, 3);
        assert_relative_eq!(est.slope.unwrap(), -10.0);
    }

    #[test]
    fn test_gap_years_use_observation_index() {
        // 2019/2021/2023 with values 100, 90, 80: fitted on index 0..2,
        // so the slope is -10 per observation step, not -5 per year
        let series = series_of(vec![
            record(2019, Some(100)),
            record(2021, Some(90)),
            record(2023, Some(80)),
        ]);
        let est = trend_estimate(&series, Metric::ActiveCount, 3);
        assert_eq!(est.sample_count, 3);
        assert_relative_eq!(est.slope.unwrap(), -10.0);
    }

    #[test]
    fn test_window_trails_available_observations() {
        // 5 years but a 3-window only sees the last three values
        let series = series_of(vec![
            record(2018, Some(500)),
            record(2019, Some(400)),
            record(2020, Some(120)),
            record(2021, Some(110)),
            record(2022, Some(100)),
        ]);
        let est = trend_estimate(&series, Metric::ActiveCount, 3);
        assert_eq!(est.sample_count, 3);
        assert_relative_eq!(est.slope.unwrap(), -10.0);
    }

    #[test]
    fn test_missing_observations_reduce_sample_count() {
        let series = series_of(vec![
            record(2019, Some(100)),
            record(2020, None),
            record(2021, Some(80)),
        ]);
        let est = trend_estimate(&series, Metric::ActiveCount, 3);
        assert_eq!(est.sample_count, 2);
        assert_relative_eq!(est.slope.unwrap(), -20.0);
    }
}
