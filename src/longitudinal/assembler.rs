//! Longitudinal table assembly
//!
//! Concatenates the per-year deduplicated tables into one series per
//! tracking id, years sorted ascending with gaps preserved, and computes
//! year-over-year deltas wherever the prior calendar year is present.

use crate::error::PipelineError;
use crate::schema::{PlanYearRecord, TrackingId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Percentage change (current − prior) / prior with protected division.
/// A missing or zero prior value yields `None`.
fn pct_change(prior: Option<f64>, current: Option<f64>) -> Option<f64> {
    let prior = prior.filter(|p| *p != 0.0)?;
    Some((current? - prior) / prior)
}

/// Point change current − prior, defined only when both are present.
fn point_change(prior: Option<f64>, current: Option<f64>) -> Option<f64> {
    Some(current? - prior?)
}

fn count_f64(count: Option<i64>) -> Option<f64> {
    count.map(|c| c as f64)
}

/// Year-over-year changes for one plan-year, relative to the prior
/// calendar year. Every field is undefined when year − 1 is absent from
/// the series; the first filed year always has all-undefined deltas.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct YearDeltas {
    pub year: i32,
    pub active_pct_change: Option<f64>,
    pub retired_pct_change: Option<f64>,
    pub retiree_liability_pct_change: Option<f64>,
    pub total_liability_pct_change: Option<f64>,
    pub annuitant_ratio_change: Option<f64>,
    pub retiree_share_change: Option<f64>,
    pub fixed_income_change: Option<f64>,
    pub equity_change: Option<f64>,
}

impl YearDeltas {
    fn between(prior: &PlanYearRecord, current: &PlanYearRecord) -> Self {
        YearDeltas {
            year: current.year,
            active_pct_change: pct_change(
                count_f64(prior.participants.active),
                count_f64(current.participants.active),
            ),
            retired_pct_change: pct_change(
                count_f64(prior.participants.retired),
                count_f64(current.participants.retired),
            ),
            retiree_liability_pct_change: pct_change(
                prior.liabilities.retired,
                current.liabilities.retired,
            ),
            total_liability_pct_change: pct_change(
                prior.liabilities.total,
                current.liabilities.total,
            ),
            annuitant_ratio_change: point_change(
                prior.annuitant_ratio(),
                current.annuitant_ratio(),
            ),
            retiree_share_change: point_change(prior.retiree_share(), current.retiree_share()),
            fixed_income_change: point_change(
                prior.allocation.fixed_income,
                current.allocation.fixed_income,
            ),
            equity_change: point_change(prior.allocation.equity, current.allocation.equity),
        }
    }
}

/// One plan's filing history: records sorted by year (unique per year)
/// with the matching per-year deltas.
#[derive(Debug, Clone, Serialize)]
pub struct LongitudinalSeries {
    pub tracking_id: TrackingId,
    pub records: Vec<PlanYearRecord>,
    /// One entry per record, same order as `records`
    pub deltas: Vec<YearDeltas>,
}

impl LongitudinalSeries {
    fn new(tracking_id: TrackingId, records: Vec<PlanYearRecord>) -> Self {
        let deltas = records
            .iter()
            .enumerate()
            .map(|(i, current)| {
                let prior = (i > 0).then(|| &records[i - 1]).filter(|p| p.year == current.year - 1);
                match prior {
                    Some(prior) => YearDeltas::between(prior, current),
                    None => YearDeltas {
                        year: current.year,
                        ..Default::default()
                    },
                }
            })
            .collect();
        LongitudinalSeries {
            tracking_id,
            records,
            deltas,
        }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.records.iter().map(|r| r.year)
    }

    pub fn latest(&self) -> Option<&PlanYearRecord> {
        self.records.last()
    }

    pub fn record_for_year(&self, year: i32) -> Option<&PlanYearRecord> {
        self.records.iter().find(|r| r.year == year)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// All plans' series, keyed by tracking id. The map ordering makes every
/// downstream iteration (and therefore every output artifact) deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LongitudinalTable {
    pub series: BTreeMap<TrackingId, LongitudinalSeries>,
}

impl LongitudinalTable {
    /// Concatenate per-year deduplicated tables into one series per plan.
    ///
    /// Inputs are expected to be deduplicated per year already; a
    /// (tracking_id, year) collision across the inputs is a fatal
    /// `DuplicateKey` since it would silently corrupt the deltas.
    pub fn assemble(years: Vec<Vec<PlanYearRecord>>) -> Result<Self, PipelineError> {
        let mut rows: Vec<PlanYearRecord> = years.into_iter().flatten().collect();
        rows.sort_by(|a, b| (&a.tracking_id, a.year).cmp(&(&b.tracking_id, b.year)));
        for pair in rows.windows(2) {
            if pair[0].tracking_id == pair[1].tracking_id && pair[0].year == pair[1].year {
                return Err(PipelineError::DuplicateKey {
                    tracking_id: pair[1].tracking_id.to_string(),
                    year: pair[1].year,
                });
            }
        }

        let mut series: BTreeMap<TrackingId, LongitudinalSeries> = BTreeMap::new();
        let mut pending: Vec<PlanYearRecord> = Vec::new();
        for row in rows {
            if let Some(last) = pending.last() {
                if last.tracking_id != row.tracking_id {
                    let group = std::mem::take(&mut pending);
                    let id = group[0].tracking_id.clone();
                    series.insert(id.clone(), LongitudinalSeries::new(id, group));
                }
            }
            pending.push(row);
        }
        if !pending.is_empty() {
            let id = pending[0].tracking_id.clone();
            series.insert(id.clone(), LongitudinalSeries::new(id, pending));
        }
        Ok(LongitudinalTable { series })
    }

    pub fn get(&self, tracking_id: &TrackingId) -> Option<&LongitudinalSeries> {
        self.series.get(tracking_id)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
