//! Actuarial schedule normalizer
//!
//! The actuarial schedule is the authoritative source for plan existence:
//! it carries participant counts, funding-target liabilities and the
//! mortality basis. Output rows feed the matcher as the left side.

use super::alias::AliasTable;
use super::table::RawTable;
use super::value::{parse_amount, parse_count, parse_text};
use super::{resolve_row_year, warn_missing_field, IdentityColumns, NormalizeStats};
use crate::error::PipelineError;
use crate::schema::{LiabilityAmounts, MortalityBasis, ParticipantCounts};
use log::{info, warn};

/// One normalized actuarial-schedule row.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuarialRow {
    pub employer_id: String,
    pub plan_number: String,
    pub year: i32,
    pub filing_key: String,
    pub participants: ParticipantCounts,
    pub liabilities: LiabilityAmounts,
    pub mortality_basis: Option<MortalityBasis>,
    pub actuary_firm: Option<String>,
}

/// Map one raw actuarial table onto the canonical schema.
///
/// Pure with respect to the input table; the only side effect is logging
/// the dropped-row count. Rows without a resolvable identity are dropped,
/// never kept with a null identity.
pub fn normalize_actuarial(
    table: &RawTable,
    aliases: &AliasTable,
    year: i32,
) -> Result<(Vec<ActuarialRow>, NormalizeStats), PipelineError> {
    let identity = IdentityColumns::resolve(table, aliases)?;

    let active = warn_missing_field(table, aliases, "ACTIVE_COUNT");
    let retired = warn_missing_field(table, aliases, "RETIREE_COUNT");
    let separated = warn_missing_field(table, aliases, "SEPARATED_COUNT");
    let total = warn_missing_field(table, aliases, "TOTAL_PARTICIPANTS");
    let act_liab = warn_missing_field(table, aliases, "ACT_LIABILITY");
    let ret_liab = warn_missing_field(table, aliases, "RET_LIABILITY");
    let term_liab = warn_missing_field(table, aliases, "TERM_LIABILITY");
    let total_liab = warn_missing_field(table, aliases, "TOTAL_LIABILITY");
    let mortality = warn_missing_field(table, aliases, "MORTALITY_CODE");
    let actuary = table.resolve(aliases.aliases("ACTUARY_FIRM"));

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

        let mut participants = ParticipantCounts {
            active: parse_count(table.cell(raw, active)),
            retired: parse_count(table.cell(raw, retired)),
            separated: parse_count(table.cell(raw, separated)),
            total: parse_count(table.cell(raw, total)),
        };
        participants.resolve_total();

        let liabilities = LiabilityAmounts {
            active: parse_amount(table.cell(raw, act_liab)),
            retired: parse_amount(table.cell(raw, ret_liab)),
            terminated: parse_amount(table.cell(raw, term_liab)),
            total: parse_amount(table.cell(raw, total_liab)),
        };

        rows.push(ActuarialRow {
            employer_id,
            plan_number,
            year: row_year,
            filing_key,
            participants,
            liabilities,
            mortality_basis: MortalityBasis::from_code(table.cell(raw, mortality)),
            actuary_firm: actuary.and_then(|_| parse_text(table.cell(raw, actuary))),
        });
        stats.kept += 1;
    }

    if stats.dropped_missing_identifier > 0 {
        info!(
            "actuarial {}: dropped {} of {} rows with missing identifiers",
            year, stats.dropped_missing_identifier, stats.input_rows
        );
    }
    if stats.year_mismatches > 0 {
        warn!(
            "actuarial {}: {} rows reported a different plan year",
            year, stats.year_mismatches
        );
    }
    Ok((rows, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::alias::ACTUARIAL;

    fn parse(csv: &str) -> (Vec<ActuarialRow>, NormalizeStats) {
        let table = RawTable::from_csv_text(csv).unwrap();
        normalize_actuarial(&table, &ACTUARIAL, 2021).unwrap()
    }

    #[test]
    fn test_historic_aliases_resolve() {
        let (rows, stats) = parse(
            "SB_EIN,SB_PLAN_NUM,ACK_ID,SB_ACT_PARTCP_CNT,SB_RTD_PARTCP_CNT,SB_TERM_PARTCP_CNT,SB_TOT_PARTCP_CNT,SB_RTD_FNDNG_TGT_AMT,SB_MORTALITY_TBL_CD\n\
             123456789,1,ACK001,\"1,200\",400,100,\"1,700\",\"5,000,000\",P\n",
        );
        assert_eq!(stats.kept, 1);
        let row = &rows[0];
        assert_eq!(row.plan_number, "001");
        assert_eq!(row.filing_key, "ACK001");
        assert_eq!(row.participants.active, Some(1200));
        assert_eq!(row.participants.total, Some(1700));
        assert_eq!(row.liabilities.retired, Some(5_000_000.0));
        assert_eq!(row.mortality_basis, Some(MortalityBasis::Prescribed));
    }

    #[test]
    fn test_missing_identity_rows_dropped() {
        let (rows, stats) = parse(
            "EIN,PLAN_NUMBER,ACTIVE_COUNT\n\
             123456789,001,100\n\
             ,002,200\n\
             987654321,,300\n",
        );
        assert_eq!(stats.input_rows, 3);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.dropped_missing_identifier, 2);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_filing_key_synthesized_when_absent() {
        let (rows, _) = parse("EIN,PLAN_NUMBER,ACTIVE_COUNT\n123456789,1,100\n");
        assert_eq!(rows[0].filing_key, "123456789-001-2021");
    }

    #[test]
    fn test_total_falls_back_to_component_sum() {
        let (rows, _) = parse(
            "EIN,PLAN_NUMBER,ACTIVE_COUNT,RETIREE_COUNT,SEPARATED_COUNT\n\
             123456789,1,100,40,10\n",
        );
        assert_eq!(rows[0].participants.total, Some(150));
    }

    #[test]
    fn test_missing_join_key_column_is_fatal() {
        let table = RawTable::from_csv_text("ACTIVE_COUNT,RETIREE_COUNT\n100,40\n").unwrap();
        let err = normalize_actuarial(&table, &ACTUARIAL, 2021).unwrap_err();
        assert!(matches!(err, PipelineError::MissingJoinKey { .. }));
    }

    #[test]
    fn test_in_row_plan_year_wins_over_file_year() {
        // A late-filed 2020 row inside the 2021 extract keeps its own year
        let (rows, stats) = parse(
            "EIN,PLAN_NUMBER,SB_PLAN_YR,ACTIVE_COUNT\n\
             123456789,1,2021,100\n\
             987654321,1,2020,200\n",
        );
        assert_eq!(rows[0].year, 2021);
        assert_eq!(rows[1].year, 2020);
        assert_eq!(rows[1].filing_key, "987654321-001-2020");
        assert_eq!(stats.year_mismatches, 1);
    }

    #[test]
    fn test_unparsable_plan_year_falls_back_to_file_year() {
        let (rows, stats) = parse(
            "EIN,PLAN_NUMBER,SB_PLAN_YR,ACTIVE_COUNT\n123456789,1,n/a,100\n",
        );
        assert_eq!(rows[0].year, 2021);
        assert_eq!(stats.year_mismatches, 0);
    }

    #[test]
    fn test_unparsable_values_are_missing_not_zero() {
        let (rows, _) = parse(
            "EIN,PLAN_NUMBER,ACTIVE_COUNT,RET_LIABILITY\n\
             123456789,1,n/a,garbage\n",
        );
        assert_eq!(rows[0].participants.active, None);
        assert_eq!(rows[0].liabilities.retired, None);
    }
}
