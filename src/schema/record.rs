//! Core record types for reconciled plan-year data

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed zero-pad width for plan numbers.
///
/// Joins compare plan numbers as strings, so "1" and "001" must normalize
/// to the same value before any key is built.
pub const PLAN_NUMBER_WIDTH: usize = 3;

/// Normalize a raw employer identifier: strip all whitespace, uppercase.
pub fn normalize_employer_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Normalize a raw plan number: strip whitespace, zero-pad to [`PLAN_NUMBER_WIDTH`].
///
/// Values already wider than the pad width are kept as-is.
pub fn normalize_plan_number(raw: &str) -> String {
    let trimmed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.len() >= PLAN_NUMBER_WIDTH {
        trimmed
    } else {
        format!("{:0>width$}", trimmed, width = PLAN_NUMBER_WIDTH)
    }
}

/// Stable composite identity linking one plan across filing years.
///
/// Built as `normalized(employer_id) + "-" + normalized(plan_number)` and
/// immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackingId(String);

impl TrackingId {
    /// Build a tracking id from raw identifier strings, normalizing both parts.
    pub fn new(employer_id: &str, plan_number: &str) -> Self {
        TrackingId(format!(
            "{}-{}",
            normalize_employer_id(employer_id),
            normalize_plan_number(plan_number)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance of how the plan-metadata source was attached to a row.
///
/// Variants are declared in ascending confidence so the derived ordering
/// matches it: `None < SecondaryKeyMatch < PrimaryKeyMatch`. Set once by the
/// matcher, never upgraded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MergeQuality {
    /// No metadata row matched on either key
    None,
    /// Matched on the (employer_id, plan_number, year) fallback triple
    SecondaryKeyMatch,
    /// Matched on the filing acknowledgment key
    PrimaryKeyMatch,
}

impl MergeQuality {
    /// Short label used in persisted output tables
    pub fn label(&self) -> &'static str {
        match self {
            MergeQuality::None => "NONE",
            MergeQuality::SecondaryKeyMatch => "SECONDARY",
            MergeQuality::PrimaryKeyMatch => "PRIMARY",
        }
    }
}

/// Actuarial mortality basis reported on the filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MortalityBasis {
    /// Regulator-prescribed table
    Prescribed,
    /// Plan-specific substitute table
    Substitute,
}

impl MortalityBasis {
    /// Short label used in persisted output tables
    pub fn label(&self) -> &'static str {
        match self {
            MortalityBasis::Prescribed => "PRESCRIBED",
            MortalityBasis::Substitute => "SUBSTITUTE",
        }
    }

    /// Map a raw source code to a basis. Blank codes are missing, not prescribed.
    pub fn from_code(code: &str) -> Option<Self> {
        let c = code.trim().to_uppercase();
        if c.is_empty() {
            return None;
        }
        match c.as_str() {
            "P" | "1" | "STD" | "STANDARD" => Some(MortalityBasis::Prescribed),
            _ => Some(MortalityBasis::Substitute),
        }
    }
}

/// Which of the source schedules contributed to a reconciled row.
///
/// Downstream consumers use this to decide which derived fields are
/// trustworthy (e.g. allocation deltas need the financial schedule).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePresence {
    pub actuarial: bool,
    pub metadata: bool,
    pub financial: bool,
}

impl SourcePresence {
    pub fn count(&self) -> usize {
        self.actuarial as usize + self.metadata as usize + self.financial as usize
    }
}

/// Participant counts for one plan-year. All fields are reported
/// non-negative integers; absent values stay absent (never zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantCounts {
    pub active: Option<i64>,
    pub retired: Option<i64>,
    pub separated: Option<i64>,
    pub total: Option<i64>,
}

impl ParticipantCounts {
    /// Fill `total` from the sum of the component counts when it was not
    /// independently reported. Missing components count as zero only if at
    /// least one component is present; all-missing stays missing.
    pub fn resolve_total(&mut self) {
        if self.total.is_some() {
            return;
        }
        let parts = [self.active, self.retired, self.separated];
        if parts.iter().any(|p| p.is_some()) {
            self.total = Some(parts.iter().flatten().sum());
        }
    }
}

/// Liability amounts (currency units) for one plan-year, all nullable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiabilityAmounts {
    pub active: Option<f64>,
    pub retired: Option<f64>,
    pub terminated: Option<f64>,
    pub total: Option<f64>,
}

/// Asset allocation as fractions in [0, 1], independently sourced from the
/// financial schedule and nullable per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub equity: Option<f64>,
    pub fixed_income: Option<f64>,
    pub real_estate: Option<f64>,
    pub alternatives: Option<f64>,
    pub cash: Option<f64>,
}

/// One filing-year snapshot for one plan.
///
/// Invariant enforced by the deduplicator: at most one record per
/// (`tracking_id`, `year`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanYearRecord {
    pub tracking_id: TrackingId,
    pub employer_id: String,
    pub plan_number: String,
    pub year: i32,

    /// Filing acknowledgment key, reported or synthesized as
    /// `EIN-PPP-YYYY` from the identity components
    pub filing_key: String,

    // Plan metadata (supplemental source)
    pub sponsor_name: Option<String>,
    pub plan_name: Option<String>,
    pub industry_code: Option<String>,

    // Actuarial schedule
    pub participants: ParticipantCounts,
    pub liabilities: LiabilityAmounts,
    pub mortality_basis: Option<MortalityBasis>,
    pub actuary_firm: Option<String>,

    // Financial schedule
    pub allocation: AssetAllocation,
    pub annuity_purchases: Option<f64>,
    pub insurer_transfers: Option<f64>,
    pub benefits_paid: Option<f64>,
    pub contributions: Option<f64>,

    pub merge_quality: MergeQuality,
    pub sources: SourcePresence,
}

impl PlanYearRecord {
    /// (retired + separated) / total with protected division.
    /// Missing or zero denominator yields `None`, never infinity or zero.
    pub fn annuitant_ratio(&self) -> Option<f64> {
        let total = self.participants.total.filter(|&t| t > 0)?;
        let retired = self.participants.retired?;
        let separated = self.participants.separated.unwrap_or(0);
        Some((retired + separated) as f64 / total as f64)
    }

    /// retired / total with protected division (freeze-rule input).
    pub fn retiree_share(&self) -> Option<f64> {
        let total = self.participants.total.filter(|&t| t > 0)?;
        Some(self.participants.retired? as f64 / total as f64)
    }

    /// Total liability per active participant.
    pub fn liability_per_active(&self) -> Option<f64> {
        let active = self.participants.active.filter(|&a| a > 0)?;
        Some(self.liabilities.total? / active as f64)
    }

    /// Retiree liability per annuitant (retired + separated).
    pub fn liability_per_annuitant(&self) -> Option<f64> {
        let retired = self.participants.retired?;
        let separated = self.participants.separated.unwrap_or(0);
        let annuitants = retired + separated;
        if annuitants <= 0 {
            return None;
        }
        Some(self.liabilities.retired? / annuitants as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_normalization_is_stable() {
        assert_eq!(normalize_employer_id(" 123 456 "), "123456");
        assert_eq!(
            normalize_employer_id("123456"),
            normalize_employer_id(" 123456 ")
        );
        assert_eq!(normalize_plan_number(" 1 "), "001");
        assert_eq!(normalize_plan_number("001"), "001");
        assert_eq!(normalize_plan_number("1234"), "1234");
    }

    #[test]
    fn test_tracking_id_composition() {
        let id = TrackingId::new(" 12-3456789 ", "1");
        assert_eq!(id.as_str(), "12-3456789-001");
        assert_eq!(id, TrackingId::new("12-3456789", " 001"));
    }

    #[test]
    fn test_merge_quality_ordering() {
        assert!(MergeQuality::PrimaryKeyMatch > MergeQuality::SecondaryKeyMatch);
        assert!(MergeQuality::SecondaryKeyMatch > MergeQuality::None);
    }

    #[test]
    fn test_mortality_basis_mapping() {
        assert_eq!(
            MortalityBasis::from_code("STD"),
            Some(MortalityBasis::Prescribed)
        );
        assert_eq!(
            MortalityBasis::from_code("2"),
            Some(MortalityBasis::Substitute)
        );
        assert_eq!(
            MortalityBasis::from_code("SUB-A"),
            Some(MortalityBasis::Substitute)
        );
        assert_eq!(MortalityBasis::from_code("  "), None);
    }

    #[test]
    fn test_total_fallback_sum() {
        let mut counts = ParticipantCounts {
            active: Some(100),
            retired: Some(40),
            separated: None,
            total: None,
        };
        counts.resolve_total();
        assert_eq!(counts.total, Some(140));

        // Independently reported total is never overwritten
        let mut reported = ParticipantCounts {
            active: Some(100),
            retired: Some(40),
            separated: Some(10),
            total: Some(149),
        };
        reported.resolve_total();
        assert_eq!(reported.total, Some(149));

        // All components missing stays missing
        let mut empty = ParticipantCounts::default();
        empty.resolve_total();
        assert_eq!(empty.total, None);
    }

    fn record_with_counts(active: Option<i64>, retired: Option<i64>, total: Option<i64>) -> PlanYearRecord {
        PlanYearRecord {
            tracking_id: TrackingId::new("123456789", "001"),
            employer_id: "123456789".into(),
            plan_number: "001".into(),
            year: 2021,
            filing_key: "123456789-001-2021".into(),
            sponsor_name: None,
            plan_name: None,
            industry_code: None,
            participants: ParticipantCounts {
                active,
                retired,
                separated: Some(10),
                total,
            },
            liabilities: LiabilityAmounts::default(),
            mortality_basis: None,
            actuary_firm: None,
            allocation: AssetAllocation::default(),
            annuity_purchases: None,
            insurer_transfers: None,
            benefits_paid: None,
            contributions: None,
            merge_quality: MergeQuality::None,
            sources: SourcePresence::default(),
        }
    }

    #[test]
    fn test_annuitant_ratio_protected_division() {
        let rec = record_with_counts(Some(50), Some(40), Some(100));
        assert_eq!(rec.annuitant_ratio(), Some(0.5));

        // Zero denominator is undefined, not infinity
        let zero = record_with_counts(Some(0), Some(0), Some(0));
        assert_eq!(zero.annuitant_ratio(), None);

        // Missing denominator is undefined, not zero
        let missing = record_with_counts(Some(50), Some(40), None);
        assert_eq!(missing.annuitant_ratio(), None);
    }
}
