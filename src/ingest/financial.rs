//! Financial schedule normalizer
//!
//! Carries the asset-allocation percentages and the annuity-purchase /
//! insurer-transfer amounts that corroborate buy-out activity. Allocation
//! values arrive either as fractions or percentage points and are stored
//! uniformly as fractions in [0, 1].

use super::alias::AliasTable;
use super::table::RawTable;
use super::value::{parse_amount, parse_fraction};
use super::{resolve_row_year, warn_missing_field, IdentityColumns, NormalizeStats};
use crate::error::PipelineError;
use crate::schema::AssetAllocation;
use log::{info, warn};

/// One normalized financial-schedule row.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialRow {
    pub employer_id: String,
    pub plan_number: String,
    pub year: i32,
    pub filing_key: String,
    pub allocation: AssetAllocation,
    pub annuity_purchases: Option<f64>,
    pub insurer_transfers: Option<f64>,
    pub benefits_paid: Option<f64>,
    pub contributions: Option<f64>,
}

/// Map one raw financial table onto the canonical schema.
pub fn normalize_financial(
    table: &RawTable,
    aliases: &AliasTable,
    year: i32,
) -> Result<(Vec<FinancialRow>, NormalizeStats), PipelineError> {
    let identity = IdentityColumns::resolve(table, aliases)?;

    let equity = warn_missing_field(table, aliases, "ASSET_EQUITY");
    let fixed_income = warn_missing_field(table, aliases, "ASSET_FIXED_INCOME");
    let real_estate = table.resolve(aliases.aliases("ASSET_REAL_ESTATE"));
    let alternatives = table.resolve(aliases.aliases("ASSET_ALTERNATIVES"));
    let cash = table.resolve(aliases.aliases("ASSET_CASH"));
    let annuity = warn_missing_field(table, aliases, "ANNUITY_PURCHASES");
    let transfers = table.resolve(aliases.aliases("TRANSFERRED_TO_INSURERS"));
    let benefits = table.resolve(aliases.aliases("BENEFITS_PAID"));
    let contributions = table.resolve(aliases.aliases("CONTRIBUTIONS"));

    let mut stats = NormalizeStats {
        input_rows: table.len(),
        ..Default::default()
    };
    let mut rows = Vec::with_capacity(table.len());

    for raw in table.rows() {
        let Some((employer_id, plan_number)) = identity.identity(table, raw) else {
            stats.dropped_missing_identifier += 1;
            continue;
        };
        let row_year = resolve_row_year(&identity, table, raw, year, &mut stats);
        let filing_key = identity.filing_key(table, raw, &employer_id, &plan_number, row_year);

        rows.push(FinancialRow {
            employer_id,
            plan_number,
            year: row_year,
            filing_key,
            allocation: AssetAllocation {
                equity: parse_fraction(table.cell(raw, equity)),
                fixed_income: parse_fraction(table.cell(raw, fixed_income)),
                real_estate: parse_fraction(table.cell(raw, real_estate)),
                alternatives: parse_fraction(table.cell(raw, alternatives)),
                cash: parse_fraction(table.cell(raw, cash)),
            },
            annuity_purchases: parse_amount(table.cell(raw, annuity)),
            insurer_transfers: parse_amount(table.cell(raw, transfers)),
            benefits_paid: parse_amount(table.cell(raw, benefits)),
            contributions: parse_amount(table.cell(raw, contributions)),
        });
        stats.kept += 1;
    }

    if stats.dropped_missing_identifier > 0 {
        info!(
            "financial {}: dropped {} of {} rows with missing identifiers",
            year, stats.dropped_missing_identifier, stats.input_rows
        );
    }
    if stats.year_mismatches > 0 {
        warn!(
            "financial {}: {} rows reported a different plan year",
            year, stats.year_mismatches
        );
    }
    Ok((rows, stats))
}
