//! Per-sponsor rollup
//!
//! Aggregates plans under the same owning employer into one row per
//! (employer_id, year): missing-aware sums for counts and amounts, mean
//! allocation fractions, plan count and the joined plan-number list.

use crate::longitudinal::assembler::LongitudinalTable;
use crate::schema::PlanYearRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// All-missing stays missing; any present value makes the sum defined.
fn sum_counts(values: impl Iterator<Item = Option<i64>>) -> Option<i64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0) + v))
}

fn sum_amounts(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Mean over the present values only; all-missing stays missing.
fn mean_amounts(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// One sponsor's plans aggregated for one year.
#[derive(Debug, Clone, Serialize)]
pub struct SponsorYearRollup {
    pub employer_id: String,
    pub year: i32,
    /// First non-empty sponsor name among the sponsor's plans
    pub sponsor_name: Option<String>,
    pub plan_count: usize,
    /// Sorted, comma-joined plan numbers
    pub plan_numbers: String,
    pub active: Option<i64>,
    pub retired: Option<i64>,
    pub separated: Option<i64>,
    pub total_participants: Option<i64>,
    pub total_liability: Option<f64>,
    pub retiree_liability: Option<f64>,
    pub annuity_purchases: Option<f64>,
    pub benefits_paid: Option<f64>,
    pub contributions: Option<f64>,
    pub mean_equity: Option<f64>,
    pub mean_fixed_income: Option<f64>,
    /// (retired + separated) / total over the summed counts
    pub annuitant_ratio: Option<f64>,
}

fn aggregate(employer_id: &str, year: i32, plans: &[&PlanYearRecord]) -> SponsorYearRollup {
    let mut plan_numbers: Vec<&str> = plans.iter().map(|p| p.plan_number.as_str()).collect();
    plan_numbers.sort_unstable();
    plan_numbers.dedup();

    let retired = sum_counts(plans.iter().map(|p| p.participants.retired));
    let separated = sum_counts(plans.iter().map(|p| p.participants.separated));
    let total = sum_counts(plans.iter().map(|p| p.participants.total));
    let annuitant_ratio = match (retired, total) {
        (Some(r), Some(t)) if t > 0 => Some((r + separated.unwrap_or(0)) as f64 / t as f64),
        _ => None,
    };

    SponsorYearRollup {
        employer_id: employer_id.to_string(),
        year,
        sponsor_name: plans.iter().find_map(|p| p.sponsor_name.clone()),
        plan_count: plans.len(),
        plan_numbers: plan_numbers.join(","),
        active: sum_counts(plans.iter().map(|p| p.participants.active)),
        retired,
        separated,
        total_participants: total,
        total_liability: sum_amounts(plans.iter().map(|p| p.liabilities.total)),
        retiree_liability: sum_amounts(plans.iter().map(|p| p.liabilities.retired)),
        annuity_purchases: sum_amounts(plans.iter().map(|p| p.annuity_purchases)),
        benefits_paid: sum_amounts(plans.iter().map(|p| p.benefits_paid)),
        contributions: sum_amounts(plans.iter().map(|p| p.contributions)),
        mean_equity: mean_amounts(plans.iter().map(|p| p.allocation.equity)),
        mean_fixed_income: mean_amounts(plans.iter().map(|p| p.allocation.fixed_income)),
        annuitant_ratio,
    }
}

/// Build the rollup rows, ordered by (employer_id, year).
pub fn build_rollup(table: &LongitudinalTable) -> Vec<SponsorYearRollup> {
    let mut groups: BTreeMap<(&str, i32), Vec<&PlanYearRecord>> = BTreeMap::new();
    for series in table.series.values() {
        for record in &series.records {
            groups
                .entry((record.employer_id.as_str(), record.year))
                .or_default()
                .push(record);
        }
    }
    groups
        .into_iter()
        .map(|((employer_id, year), plans)| aggregate(employer_id, year, &plans))
        .collect()
}
