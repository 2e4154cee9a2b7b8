//! Duplicate collapse for consolidated plan-year rows
//!
//! After matching, a plan may still appear more than once in a year when
//! the source carried amended or resubmitted filings. One row per
//! (tracking_id, year) survives; the rest are collapsed deterministically.

use crate::error::PipelineError;
use crate::schema::PlanYearRecord;
use log::info;
use serde::Serialize;
use std::cmp::Reverse;

/// Duplicate-collapse counts for one year, part of the run diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DedupStats {
    pub input_rows: usize,
    /// Rows removed because another row shared their (tracking_id, year)
    pub collapsed: usize,
}

/// Collapse duplicate (tracking_id, year) rows.
///
/// Within a duplicate group the row with the highest merge quality wins;
/// ties break on the lexicographically smallest filing key, so the survivor
/// does not depend on input order.
pub fn deduplicate(
    mut rows: Vec<PlanYearRecord>,
) -> Result<(Vec<PlanYearRecord>, DedupStats), PipelineError> {
    let mut stats = DedupStats {
        input_rows: rows.len(),
        collapsed: 0,
    };

    rows.sort_by(|a, b| {
        (&a.tracking_id, a.year, Reverse(a.merge_quality), &a.filing_key).cmp(&(
            &b.tracking_id,
            b.year,
            Reverse(b.merge_quality),
            &b.filing_key,
        ))
    });
    rows.dedup_by(|later, earlier| {
        let dup = later.tracking_id == earlier.tracking_id && later.year == earlier.year;
        if dup {
            stats.collapsed += 1;
        }
        dup
    });

    if stats.collapsed > 0 {
        info!(
            "collapsed {} duplicate plan-year rows out of {}",
            stats.collapsed, stats.input_rows
        );
    }
    verify_unique(&rows)?;
    Ok((rows, stats))
}

/// Post-condition check: every (tracking_id, year) appears at most once.
///
/// Expects rows sorted by (tracking_id, year). A violation here is a logic
/// error upstream, not bad input, and aborts the run.
pub fn verify_unique(rows: &[PlanYearRecord]) -> Result<(), PipelineError> {
    for pair in rows.windows(2) {
        if pair[0].tracking_id == pair[1].tracking_id && pair[0].year == pair[1].year {
            return Err(PipelineError::DuplicateKey {
                tracking_id: pair[1].tracking_id.to_string(),
                year: pair[1].year,
            });
        }
    }
    Ok(())
}
