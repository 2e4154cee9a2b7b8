//! Plan-metadata normalizer
//!
//! The metadata filing carries sponsor identity and the industry
//! classification used to build peer cohorts. It is a supplemental source:
//! rows here never create a plan-year on their own.

use super::alias::AliasTable;
use super::table::RawTable;
use super::value::parse_text;
use super::{resolve_row_year, warn_missing_field, IdentityColumns, NormalizeStats};
use crate::error::PipelineError;
use log::{info, warn};

/// One normalized plan-metadata row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub employer_id: String,
    pub plan_number: String,
    pub year: i32,
    pub filing_key: String,
    pub sponsor_name: Option<String>,
    pub plan_name: Option<String>,
    pub industry_code: Option<String>,
}

/// Map one raw metadata table onto the canonical schema.
pub fn normalize_metadata(
    table: &RawTable,
    aliases: &AliasTable,
    year: i32,
) -> Result<(Vec<MetadataRow>, NormalizeStats), PipelineError> {
    let identity = IdentityColumns::resolve(table, aliases)?;

    let sponsor = warn_missing_field(table, aliases, "SPONSOR_NAME");
    let plan_name = table.resolve(aliases.aliases("PLAN_NAME"));
    let industry = warn_missing_field(table, aliases, "INDUSTRY_CODE");

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

        rows.push(MetadataRow {
            employer_id,
            plan_number,
            year: row_year,
            filing_key,
            sponsor_name: sponsor.and_then(|_| parse_text(table.cell(raw, sponsor))),
            plan_name: plan_name.and_then(|_| parse_text(table.cell(raw, plan_name))),
            industry_code: industry.and_then(|_| parse_text(table.cell(raw, industry))),
        });
        stats.kept += 1;
    }

    if stats.dropped_missing_identifier > 0 {
        info!(
            "metadata {}: dropped {} of {} rows with missing identifiers",
            year, stats.dropped_missing_identifier, stats.input_rows
        );
    }
    if stats.year_mismatches > 0 {
        warn!(
            "metadata {}: {} rows reported a different plan year",
            year, stats.year_mismatches
        );
    }
    Ok((rows, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::alias::METADATA;

    #[test]
    fn test_sponsor_fields_extracted() {
        let table = RawTable::from_csv_text(
            "ACK_ID,SPONS_DFE_EIN,SPONS_DFE_PN,SPONS_DFE_NAME,PLAN_NAME,BUSINESS_CODE\n\
             ACK001,123456789,1,ACME CORP,ACME PENSION PLAN,3361\n",
        )
        .unwrap();
        let (rows, stats) = normalize_metadata(&table, &METADATA, 2021).unwrap();
        assert_eq!(stats.kept, 1);
        assert_eq!(rows[0].plan_number, "001");
        assert_eq!(rows[0].sponsor_name.as_deref(), Some("ACME CORP"));
        assert_eq!(rows[0].industry_code.as_deref(), Some("3361"));
    }

    #[test]
    fn test_reported_plan_year_carried_onto_row() {
        let table = RawTable::from_csv_text(
            "ACK_ID,EIN,PN,PLAN_YEAR,SPONSOR_NAME\nACK001,123456789,1,2019,ACME\n",
        )
        .unwrap();
        let (rows, stats) = normalize_metadata(&table, &METADATA, 2021).unwrap();
        assert_eq!(rows[0].year, 2019);
        assert_eq!(stats.year_mismatches, 1);
    }

    #[test]
    fn test_blank_sponsor_fields_are_null() {
        let table = RawTable::from_csv_text(
            "ACK_ID,EIN,PN,SPONSOR_NAME,BUSINESS_CODE\nACK001,123456789,2,,N/A\n",
        )
        .unwrap();
        let (rows, _) = normalize_metadata(&table, &METADATA, 2021).unwrap();
        assert_eq!(rows[0].sponsor_name, None);
        assert_eq!(rows[0].industry_code, None);
    }
}
