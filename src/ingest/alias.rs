//! Canonical-field alias tables
//!
//! Each source type carries years of historical header spellings. The
//! tables here map every canonical field to an ordered list of known
//! aliases; resolution is first-match-wins against the table headers.
//! They are static read-only data passed explicitly into the normalizers,
//! never module state consulted implicitly.

/// Ordered alias lists for one source type.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    /// Source name used in logs and errors
    pub source: &'static str,
    entries: &'static [(&'static str, &'static [&'static str])],
}

impl AliasTable {
    /// Aliases for a canonical field, in priority order. Unknown fields
    /// resolve to an empty list rather than panicking.
    pub fn aliases(&self, canonical: &str) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }
}

// Canonical field names shared across the normalizers
pub const EMPLOYER_ID: &str = "EMPLOYER_ID";
pub const PLAN_NUMBER: &str = "PLAN_NUMBER";
pub const PLAN_YEAR: &str = "PLAN_YEAR";
pub const FILING_KEY: &str = "FILING_KEY";

/// Actuarial schedule (participant counts, liabilities, mortality basis).
pub static ACTUARIAL: AliasTable = AliasTable {
    source: "actuarial",
    entries: &[
        (EMPLOYER_ID, &["SB_EIN", "SPONS_DFE_EIN", "EIN"]),
        (PLAN_NUMBER, &["SB_PLAN_NUM", "SB_PN", "PLAN_NUMBER", "PLAN_NO", "PN"]),
        (PLAN_YEAR, &["SB_PLAN_YR", "PLAN_YEAR", "PLAN_YR"]),
        (FILING_KEY, &["ACK_ID", "SB_ACK_ID"]),
        (
            "ACTIVE_COUNT",
            &[
                "SB_ACT_PARTCP_CNT",
                "ACTIVE_COUNT",
                "ACT_PARTCP_CNT",
                "ACTIVE_PARTICIPANTS",
                "ACTIVES",
            ],
        ),
        (
            "RETIREE_COUNT",
            &["SB_RTD_PARTCP_CNT", "RETIREE_COUNT", "RTD_PARTCP_CNT", "RETIREES"],
        ),
        (
            "SEPARATED_COUNT",
            &["SB_TERM_PARTCP_CNT", "SEPARATED_COUNT", "TERM_PARTCP_CNT"],
        ),
        (
            "TOTAL_PARTICIPANTS",
            &["SB_TOT_PARTCP_CNT", "TOTAL_PARTICIPANTS", "TOT_PARTCP_CNT", "TOTAL"],
        ),
        ("ACT_LIABILITY", &["SB_ACT_VSTD_FNDNG_TGT_AMT", "ACT_LIABILITY"]),
        ("RET_LIABILITY", &["SB_RTD_FNDNG_TGT_AMT", "RET_LIABILITY"]),
        ("TERM_LIABILITY", &["SB_TERM_FNDNG_TGT_AMT", "TERM_LIABILITY"]),
        ("TOTAL_LIABILITY", &["SB_TOT_FNDNG_TGT_AMT", "TOTAL_LIABILITY"]),
        ("MORTALITY_CODE", &["SB_MORTALITY_TBL_CD", "MORTALITY_CODE"]),
        ("ACTUARY_FIRM", &["SB_ACTUARY_FIRM_NAME", "ACTUARY_FIRM_NAME"]),
    ],
};

/// Plan-metadata filing (sponsor identity, industry classification).
pub static METADATA: AliasTable = AliasTable {
    source: "metadata",
    entries: &[
        (EMPLOYER_ID, &["SPONS_DFE_EIN", "SPONSOR_EIN", "EIN"]),
        (
            PLAN_NUMBER,
            &["SPONS_DFE_PN", "PLAN_NUM", "PLAN_NUMBER", "PNUM", "PN"],
        ),
        (PLAN_YEAR, &["PLAN_YEAR", "PLAN_YR", "FORM_PLAN_YEAR_BEGIN_DATE"]),
        (FILING_KEY, &["ACK_ID"]),
        (
            "SPONSOR_NAME",
            &["SPONSOR_DFE_NAME", "SPONS_DFE_NAME", "SPONSOR_NAME"],
        ),
        ("PLAN_NAME", &["PLAN_NAME"]),
        (
            "INDUSTRY_CODE",
            &["BUSINESS_CODE", "BUSINESS_CD", "NAICS_CODE", "INDUSTRY_CODE"],
        ),
    ],
};

/// Financial schedule (asset allocation, annuity purchases, cash flows).
pub static FINANCIAL: AliasTable = AliasTable {
    source: "financial",
    entries: &[
        (EMPLOYER_ID, &["SCH_R_EIN", "SPONS_DFE_EIN", "EIN"]),
        (PLAN_NUMBER, &["SCH_R_PN", "SCH_R_PLAN_NUM", "PLAN_NUMBER", "PN"]),
        (PLAN_YEAR, &["SCH_R_PLAN_YR", "PLAN_YEAR", "PLAN_YR"]),
        (FILING_KEY, &["SCH_R_ACK_ID", "ACK_ID"]),
        ("ASSET_EQUITY", &["ASSET_EQUITY_PCT", "ASSET_EQUITY", "EQUITY_PCT"]),
        (
            "ASSET_FIXED_INCOME",
            &["ASSET_FIXED_INCOME_PCT", "ASSET_FIXED_INCOME", "FIXED_INCOME_PCT"],
        ),
        (
            "ASSET_REAL_ESTATE",
            &["ASSET_REAL_ESTATE_PCT", "ASSET_REAL_ESTATE", "REAL_ESTATE_PCT"],
        ),
        (
            "ASSET_ALTERNATIVES",
            &["ASSET_ALTERNATIVES_PCT", "ASSET_ALTERNATIVES", "ALTERNATIVES_PCT"],
        ),
        (
            "ASSET_CASH",
            &["ASSET_CASH_PCT", "ASSET_CASH_EQUIVALENT", "CASH_PCT"],
        ),
        ("ANNUITY_PURCHASES", &["ANNUITY_PURCHASES", "ANNUITY_PURCHASE_AMT"]),
        (
            "TRANSFERRED_TO_INSURERS",
            &["TRANSFERRED_TO_INSURERS", "INS_CARRIER_BNFTS_AMT"],
        ),
        ("BENEFITS_PAID", &["BENEFITS_PAID", "TOT_DISTRIB_BNFT_AMT"]),
        ("CONTRIBUTIONS", &["CONTRIBUTIONS", "TOT_CONTRIB_AMT"]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_priority_order() {
        let aliases = ACTUARIAL.aliases("ACTIVE_COUNT");
        assert_eq!(aliases[0], "SB_ACT_PARTCP_CNT");
        assert!(aliases.len() >= 5);
    }

    #[test]
    fn test_unknown_field_is_empty() {
        assert!(ACTUARIAL.aliases("NO_SUCH_FIELD").is_empty());
    }

    #[test]
    fn test_every_table_carries_the_join_keys() {
        for table in [&ACTUARIAL, &METADATA, &FINANCIAL] {
            assert!(!table.aliases(EMPLOYER_ID).is_empty());
            assert!(!table.aliases(PLAN_NUMBER).is_empty());
            assert!(!table.aliases(FILING_KEY).is_empty());
        }
    }
}
