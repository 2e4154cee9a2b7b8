//! Multi-key record matcher
//!
//! Joins the per-year normalized tables into one consolidated row per
//! authoritative actuarial row. The filing acknowledgment key is the
//! primary join key; rows it fails to match retry on the
//! (employer_id, plan_number, year) triple against the full supplemental
//! pool, so a row can still match via fallback even after other rows
//! matched via the primary key.

use crate::ingest::{ActuarialRow, FinancialRow, MetadataRow};
use crate::schema::{MergeQuality, PlanYearRecord, SourcePresence, TrackingId};
use log::info;
use serde::Serialize;
use std::collections::HashMap;

/// Join outcome counts for one year, part of the run diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MatchStats {
    pub primary_matches: usize,
    pub secondary_matches: usize,
    pub unmatched: usize,
    /// Supplemental metadata rows that matched no authoritative row
    pub metadata_dropped: usize,
    /// Supplemental financial rows that matched no authoritative row
    pub financial_dropped: usize,
}

/// Index of supplemental rows by primary key and by fallback triple.
///
/// Multiple rows may share a key (line items); candidate lists keep input
/// order and the matcher picks deterministically by filing key.
struct SupplementalIndex<'a, T> {
    by_filing_key: HashMap<&'a str, Vec<usize>>,
    by_triple: HashMap<(&'a str, &'a str, i32), Vec<usize>>,
    rows: &'a [T],
}

impl<'a, T> SupplementalIndex<'a, T> {
    fn build(
        rows: &'a [T],
        key_of: impl Fn(&'a T) -> (&'a str, &'a str, &'a str, i32),
    ) -> Self {
        let mut by_filing_key: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_triple: HashMap<(&str, &str, i32), Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            let (filing_key, employer_id, plan_number, year) = key_of(row);
            by_filing_key.entry(filing_key).or_default().push(i);
            by_triple
                .entry((employer_id, plan_number, year))
                .or_default()
                .push(i);
        }
        SupplementalIndex {
            by_filing_key,
            by_triple,
            rows,
        }
    }

    /// Two-step lookup: primary key first, fallback triple second.
    /// Returns the matched row index and which step produced it.
    fn lookup(
        &self,
        filing_key: &str,
        employer_id: &str,
        plan_number: &str,
        year: i32,
        tie_break: impl Fn(&'a T) -> &'a str,
    ) -> Option<(usize, MergeQuality)> {
        let rows = self.rows;
        let pick = |candidates: &Vec<usize>| {
            candidates
                .iter()
                .copied()
                .min_by_key(|&i| (tie_break(&rows[i]), i))
        };
        if let Some(i) = self.by_filing_key.get(filing_key).and_then(pick) {
            return Some((i, MergeQuality::PrimaryKeyMatch));
        }
        self.by_triple
            .get(&(employer_id, plan_number, year))
            .and_then(pick)
            .map(|i| (i, MergeQuality::SecondaryKeyMatch))
    }
}

/// Join one year's normalized tables into consolidated plan-year rows.
///
/// Only plans present in the authoritative actuarial source appear in the
/// output; supplemental rows without a match are dropped and counted, not
/// silently discarded. An empty authoritative source yields an empty
/// result — the caller decides whether to skip the year.
pub fn match_year(
    actuarial: Vec<ActuarialRow>,
    metadata: &[MetadataRow],
    financial: &[FinancialRow],
) -> (Vec<PlanYearRecord>, MatchStats) {
    let mut stats = MatchStats::default();
    if actuarial.is_empty() {
        stats.metadata_dropped = metadata.len();
        stats.financial_dropped = financial.len();
        return (Vec::new(), stats);
    }

    let metadata_index = SupplementalIndex::build(metadata, |m| {
        (m.filing_key.as_str(), m.employer_id.as_str(), m.plan_number.as_str(), m.year)
    });
    let financial_index = SupplementalIndex::build(financial, |f| {
        (f.filing_key.as_str(), f.employer_id.as_str(), f.plan_number.as_str(), f.year)
    });

    let mut metadata_consumed = vec![false; metadata.len()];
    let mut financial_consumed = vec![false; financial.len()];

    let mut records = Vec::with_capacity(actuarial.len());
    for act in actuarial {
        let tracking_id = TrackingId::new(&act.employer_id, &act.plan_number);
        let mut sources = SourcePresence {
            actuarial: true,
            ..Default::default()
        };

        // merge_quality is set exactly once, from the step that matched
        let meta_match = metadata_index.lookup(
            &act.filing_key,
            &act.employer_id,
            &act.plan_number,
            act.year,
            |m| m.filing_key.as_str(),
        );
        let merge_quality = match &meta_match {
            Some((_, quality)) => *quality,
            None => MergeQuality::None,
        };
        match merge_quality {
            MergeQuality::PrimaryKeyMatch => stats.primary_matches += 1,
            MergeQuality::SecondaryKeyMatch => stats.secondary_matches += 1,
            MergeQuality::None => stats.unmatched += 1,
        }
        let meta = meta_match.map(|(i, _)| {
            metadata_consumed[i] = true;
            sources.metadata = true;
            &metadata[i]
        });

        // Financial attaches the same two-step way but only flips presence
        let fin = financial_index
            .lookup(
                &act.filing_key,
                &act.employer_id,
                &act.plan_number,
                act.year,
                |f| f.filing_key.as_str(),
            )
            .map(|(i, _)| {
                financial_consumed[i] = true;
                sources.financial = true;
                &financial[i]
            });

        records.push(PlanYearRecord {
            tracking_id,
            employer_id: act.employer_id,
            plan_number: act.plan_number,
            year: act.year,
            filing_key: act.filing_key,
            sponsor_name: meta.and_then(|m| m.sponsor_name.clone()),
            plan_name: meta.and_then(|m| m.plan_name.clone()),
            industry_code: meta.and_then(|m| m.industry_code.clone()),
            participants: act.participants,
            liabilities: act.liabilities,
            mortality_basis: act.mortality_basis,
            actuary_firm: act.actuary_firm,
            allocation: fin.map(|f| f.allocation).unwrap_or_default(),
            annuity_purchases: fin.and_then(|f| f.annuity_purchases),
            insurer_transfers: fin.and_then(|f| f.insurer_transfers),
            benefits_paid: fin.and_then(|f| f.benefits_paid),
            contributions: fin.and_then(|f| f.contributions),
            merge_quality,
            sources,
        });
    }

    stats.metadata_dropped = metadata_consumed.iter().filter(|&&c| !c).count();
    stats.financial_dropped = financial_consumed.iter().filter(|&&c| !c).count();
    if stats.metadata_dropped + stats.financial_dropped > 0 {
        info!(
            "dropped {} metadata and {} financial rows with no authoritative match",
            stats.metadata_dropped, stats.financial_dropped
        );
    }

    (records, stats)
}
