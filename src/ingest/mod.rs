//! Source normalization: raw yearly tables to canonical per-source rows

pub mod alias;
mod actuarial;
mod financial;
mod metadata;
mod table;
mod value;

pub use actuarial::{normalize_actuarial, ActuarialRow};
pub use financial::{normalize_financial, FinancialRow};
pub use metadata::{normalize_metadata, MetadataRow};
pub use table::RawTable;
pub use value::{parse_amount, parse_count, parse_fraction, parse_text, parse_year};

use crate::error::PipelineError;
use crate::schema::{normalize_employer_id, normalize_plan_number};
use alias::AliasTable;
use serde::Serialize;

/// Row counts for one normalization pass, reported in the run diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NormalizeStats {
    pub input_rows: usize,
    pub kept: usize,
    /// Rows dropped because no resolvable identity key was present
    pub dropped_missing_identifier: usize,
    /// Rows whose reported plan year disagreed with the file's year
    pub year_mismatches: usize,
}

/// Deterministic synthesized filing key: `EIN-PPP-YYYY`.
///
/// Used when the acknowledgment column is absent; becomes the row's de
/// facto primary key downstream.
pub fn synthesize_filing_key(employer_id: &str, plan_number: &str, year: i32) -> String {
    format!("{}-{}-{}", employer_id, plan_number, year)
}

/// Resolved positions of the identity columns in a raw table.
///
/// The plan-number and employer-id columns are the join keys: a table where
/// neither alias resolves cannot be matched at all and fails hard. The
/// filing-key and plan-year columns are optional (synthesized / taken from
/// the file year when absent).
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentityColumns {
    pub employer_id: usize,
    pub plan_number: usize,
    pub filing_key: Option<usize>,
    pub plan_year: Option<usize>,
}

impl IdentityColumns {
    pub fn resolve(table: &RawTable, aliases: &AliasTable) -> Result<Self, PipelineError> {
        let employer_id = table
            .resolve(aliases.aliases(alias::EMPLOYER_ID))
            .ok_or(PipelineError::MissingJoinKey {
                table: aliases.source,
                field: alias::EMPLOYER_ID,
            })?;
        let plan_number = table
            .resolve(aliases.aliases(alias::PLAN_NUMBER))
            .ok_or(PipelineError::MissingJoinKey {
                table: aliases.source,
                field: alias::PLAN_NUMBER,
            })?;
        let filing_key = table.resolve(aliases.aliases(alias::FILING_KEY));
        let plan_year = table.resolve(aliases.aliases(alias::PLAN_YEAR));
        Ok(IdentityColumns {
            employer_id,
            plan_number,
            filing_key,
            plan_year,
        })
    }

    /// Plan year reported on the row itself, when the column resolves and
    /// the value parses. The row's authoritative year; callers fall back
    /// to the file year and count the disagreements.
    pub fn plan_year(&self, table: &RawTable, row: &[String]) -> Option<i32> {
        self.plan_year
            .and_then(|_| parse_year(table.cell(row, self.plan_year)))
    }

    /// Normalized identity for one row, or `None` when either component is
    /// blank (the row is dropped and counted by the caller).
    pub fn identity(&self, table: &RawTable, row: &[String]) -> Option<(String, String)> {
        let ein = normalize_employer_id(table.cell(row, Some(self.employer_id)));
        let pn_raw = table.cell(row, Some(self.plan_number)).trim();
        if ein.is_empty() || pn_raw.is_empty() {
            return None;
        }
        Some((ein, normalize_plan_number(pn_raw)))
    }

    /// Reported filing key for the row, or the synthesized fallback.
    pub fn filing_key(
        &self,
        table: &RawTable,
        row: &[String],
        employer_id: &str,
        plan_number: &str,
        year: i32,
    ) -> String {
        self.filing_key
            .and_then(|_| parse_text(table.cell(row, self.filing_key)))
            .unwrap_or_else(|| synthesize_filing_key(employer_id, plan_number, year))
    }
}

/// Year for one row: the plan year reported on the row wins over the
/// year implied by the file; disagreements are counted, not fatal.
pub(crate) fn resolve_row_year(
    identity: &IdentityColumns,
    table: &RawTable,
    row: &[String],
    file_year: i32,
    stats: &mut NormalizeStats,
) -> i32 {
    match identity.plan_year(table, row) {
        Some(reported) => {
            if reported != file_year {
                stats.year_mismatches += 1;
            }
            reported
        }
        None => file_year,
    }
}

/// Warn once per canonical field that has no alias in the table.
/// Missing non-key fields proceed as null (schema mismatch is only fatal
/// for the join keys, handled in [`IdentityColumns::resolve`]).
pub(crate) fn warn_missing_field(table: &RawTable, aliases: &AliasTable, canonical: &str) -> Option<usize> {
    let col = table.resolve(aliases.aliases(canonical));
    if col.is_none() {
        log::warn!(
            "{} source has no alias for {}; field will be null",
            aliases.source,
            canonical
        );
    }
    col
}
