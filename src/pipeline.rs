//! Multi-year batch pipeline
//!
//! Ingest each configured filing year (normalize, match, deduplicate) in
//! parallel, then join the years into the longitudinal table and write the
//! persisted artifacts: the plan-year table, the per-sponsor rollup and a
//! JSON diagnostics file. A failed year is skipped and recorded, never
//! silently treated as a zero-activity year.

use crate::error::PipelineError;
use crate::ingest::{
    alias, normalize_actuarial, normalize_financial, normalize_metadata, FinancialRow,
    MetadataRow, NormalizeStats, RawTable,
};
use crate::longitudinal::{build_rollup, LongitudinalTable, SponsorYearRollup};
use crate::reconcile::{deduplicate, match_year, DedupStats, MatchStats};
use crate::schema::PlanYearRecord;
use crate::signals::SignalThresholds;
use chrono::Utc;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Run configuration: where the per-year source files live, where the
/// artifacts go, which years to process.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub start_year: i32,
    pub end_year: i32,
    pub thresholds: SignalThresholds,
}

impl PipelineConfig {
    pub fn years(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).collect()
    }

    pub fn actuarial_path(&self, year: i32) -> PathBuf {
        self.data_dir.join(format!("actuarial_{year}.csv"))
    }

    pub fn metadata_path(&self, year: i32) -> PathBuf {
        self.data_dir.join(format!("plan_metadata_{year}.csv"))
    }

    pub fn financial_path(&self, year: i32) -> PathBuf {
        self.data_dir.join(format!("financial_{year}.csv"))
    }
}

/// What happened to one filing year, part of the diagnostics artifact.
#[derive(Debug, Clone, Default, Serialize)]
pub struct YearDiagnostics {
    pub year: i32,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub actuarial: Option<NormalizeStats>,
    pub metadata: Option<NormalizeStats>,
    /// Why the metadata file contributed nothing (absent, undecodable,
    /// no join key); `None` when the file was usable
    pub metadata_skip_reason: Option<String>,
    pub financial: Option<NormalizeStats>,
    pub financial_skip_reason: Option<String>,
    pub match_stats: Option<MatchStats>,
    pub dedup: Option<DedupStats>,
    pub output_rows: usize,
}

impl YearDiagnostics {
    fn skipped(year: i32, reason: String) -> Self {
        YearDiagnostics {
            year,
            skipped: true,
            skip_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// Per-run diagnostic report, written beside the analytic artifacts.
/// The timestamp is recorded here and only here so the output tables stay
/// byte-comparable across runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunDiagnostics {
    pub started_at: String,
    pub years: Vec<YearDiagnostics>,
    pub plan_count: usize,
    pub row_count: usize,
}

/// Everything a run produces, also returned in memory so callers (the CLI
/// report command, tests) can analyze without re-reading the artifacts.
pub struct RunOutput {
    pub table: LongitudinalTable,
    pub rollup: Vec<SponsorYearRollup>,
    pub diagnostics: RunDiagnostics,
}

fn read_supplemental<T>(
    path: &Path,
    normalize: impl Fn(&RawTable) -> Result<(Vec<T>, NormalizeStats), PipelineError>,
) -> (Vec<T>, Option<NormalizeStats>, Option<String>) {
    let table = match RawTable::from_path(path) {
        Ok(table) => table,
        Err(err) => {
            warn!("supplemental source {} skipped: {err}", path.display());
            return (Vec::new(), None, Some(err.to_string()));
        }
    };
    match normalize(&table) {
        Ok((rows, stats)) => (rows, Some(stats), None),
        Err(err) => {
            warn!("supplemental source {} skipped: {err}", path.display());
            (Vec::new(), None, Some(err.to_string()))
        }
    }
}

/// Ingest one filing year end to end. Failures skip the year with a
/// recorded reason instead of aborting the run; only the authoritative
/// actuarial source is required.
pub fn run_year(config: &PipelineConfig, year: i32) -> (Vec<PlanYearRecord>, YearDiagnostics) {
    let actuarial_path = config.actuarial_path(year);
    let actuarial_table = match RawTable::from_path(&actuarial_path) {
        Ok(table) => table,
        Err(err) => return (Vec::new(), YearDiagnostics::skipped(year, err.to_string())),
    };
    let (actuarial_rows, actuarial_stats) =
        match normalize_actuarial(&actuarial_table, &alias::ACTUARIAL, year) {
            Ok(out) => out,
            Err(err) => return (Vec::new(), YearDiagnostics::skipped(year, err.to_string())),
        };
    if actuarial_rows.is_empty() {
        let err = PipelineError::EmptyAuthoritativeSource { year };
        return (Vec::new(), YearDiagnostics::skipped(year, err.to_string()));
    }

    let (metadata_rows, metadata_stats, metadata_skip_reason): (Vec<MetadataRow>, _, _) =
        read_supplemental(&config.metadata_path(year), |t| {
            normalize_metadata(t, &alias::METADATA, year)
        });
    let (financial_rows, financial_stats, financial_skip_reason): (Vec<FinancialRow>, _, _) =
        read_supplemental(&config.financial_path(year), |t| {
            normalize_financial(t, &alias::FINANCIAL, year)
        });

    let (matched, match_stats) = match_year(actuarial_rows, &metadata_rows, &financial_rows);
    let (records, dedup_stats) = match deduplicate(matched) {
        Ok(out) => out,
        Err(err) => return (Vec::new(), YearDiagnostics::skipped(year, err.to_string())),
    };

    info!(
        "year {year}: {} plan rows ({} primary, {} secondary, {} unmatched)",
        records.len(),
        match_stats.primary_matches,
        match_stats.secondary_matches,
        match_stats.unmatched
    );
    let diagnostics = YearDiagnostics {
        year,
        skipped: false,
        skip_reason: None,
        actuarial: Some(actuarial_stats),
        metadata: metadata_stats,
        metadata_skip_reason,
        financial: financial_stats,
        financial_skip_reason,
        match_stats: Some(match_stats),
        dedup: Some(dedup_stats),
        output_rows: records.len(),
    };
    (records, diagnostics)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Run the full pipeline and write the three artifacts into the output
/// directory. Years are independent and processed in parallel; the
/// longitudinal join is the single barrier point.
pub fn run(config: &PipelineConfig) -> Result<RunOutput, PipelineError> {
    let started_at = Utc::now().to_rfc3339();
    let years = config.years();

    let mut outcomes: Vec<(Vec<PlanYearRecord>, YearDiagnostics)> = years
        .par_iter()
        .map(|&year| run_year(config, year))
        .collect();
    outcomes.sort_by_key(|(_, diag)| diag.year);

    for (_, diag) in outcomes.iter().filter(|(_, d)| d.skipped) {
        warn!(
            "year {} skipped: {}",
            diag.year,
            diag.skip_reason.as_deref().unwrap_or("unknown")
        );
    }

    let (tables, year_diagnostics): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
    let table = LongitudinalTable::assemble(tables)?;
    let rollup = build_rollup(&table);

    let row_count = table.series.values().map(|s| s.len()).sum();
    let diagnostics = RunDiagnostics {
        started_at,
        years: year_diagnostics,
        plan_count: table.len(),
        row_count,
    };

    fs::create_dir_all(&config.output_dir).map_err(io_err(&config.output_dir))?;
    write_longitudinal_csv(&config.output_dir.join("plan_years.csv"), &table)?;
    write_rollup_csv(&config.output_dir.join("sponsor_rollup.csv"), &rollup)?;
    write_diagnostics_json(&config.output_dir.join("run_diagnostics.json"), &diagnostics)?;
    info!(
        "run complete: {} plans, {} plan-year rows",
        diagnostics.plan_count, diagnostics.row_count
    );

    Ok(RunOutput {
        table,
        rollup,
        diagnostics,
    })
}

fn fmt_count(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_amount(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Quote a text field when it would break the column or row layout.
fn fmt_text(value: Option<&str>) -> String {
    let value = value.unwrap_or_default();
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Persisted artifact (a): the full longitudinal plan-year table, one row
/// per (tracking_id, year), fully re-derivable from the raw inputs.
pub fn write_longitudinal_csv(path: &Path, table: &LongitudinalTable) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut out = BufWriter::new(file);
    let write = |out: &mut BufWriter<File>, line: &str| -> Result<(), PipelineError> {
        writeln!(out, "{line}").map_err(io_err(path))
    };

    write(&mut out, "tracking_id,employer_id,plan_number,year,filing_key,sponsor_name,plan_name,industry_code,active,retired,separated,total_participants,active_liability,retiree_liability,term_liability,total_liability,mortality_basis,actuary_firm,equity,fixed_income,real_estate,alternatives,cash,annuity_purchases,insurer_transfers,benefits_paid,contributions,merge_quality,source_count,annuitant_ratio,retiree_share,active_pct_change,retired_pct_change,retiree_liability_pct_change,total_liability_pct_change,annuitant_ratio_change,retiree_share_change,fixed_income_change,equity_change")?;

    for series in table.series.values() {
        for (record, delta) in series.records.iter().zip(&series.deltas) {
            let line = [
                record.tracking_id.to_string(),
                record.employer_id.clone(),
                record.plan_number.clone(),
                record.year.to_string(),
                fmt_text(Some(&record.filing_key)),
                fmt_text(record.sponsor_name.as_deref()),
                fmt_text(record.plan_name.as_deref()),
                fmt_text(record.industry_code.as_deref()),
                fmt_count(record.participants.active),
                fmt_count(record.participants.retired),
                fmt_count(record.participants.separated),
                fmt_count(record.participants.total),
                fmt_amount(record.liabilities.active),
                fmt_amount(record.liabilities.retired),
                fmt_amount(record.liabilities.terminated),
                fmt_amount(record.liabilities.total),
                record
                    .mortality_basis
                    .map(|b| b.label().to_string())
                    .unwrap_or_default(),
                fmt_text(record.actuary_firm.as_deref()),
                fmt_amount(record.allocation.equity),
                fmt_amount(record.allocation.fixed_income),
                fmt_amount(record.allocation.real_estate),
                fmt_amount(record.allocation.alternatives),
                fmt_amount(record.allocation.cash),
                fmt_amount(record.annuity_purchases),
                fmt_amount(record.insurer_transfers),
                fmt_amount(record.benefits_paid),
                fmt_amount(record.contributions),
                record.merge_quality.label().to_string(),
                record.sources.count().to_string(),
                fmt_amount(record.annuitant_ratio()),
                fmt_amount(record.retiree_share()),
                fmt_amount(delta.active_pct_change),
                fmt_amount(delta.retired_pct_change),
                fmt_amount(delta.retiree_liability_pct_change),
                fmt_amount(delta.total_liability_pct_change),
                fmt_amount(delta.annuitant_ratio_change),
                fmt_amount(delta.retiree_share_change),
                fmt_amount(delta.fixed_income_change),
                fmt_amount(delta.equity_change),
            ]
            .join(",");
            write(&mut out, &line)?;
        }
    }
    out.flush().map_err(io_err(path))
}

/// Persisted artifact (b): per-sponsor per-year rollup.
pub fn write_rollup_csv(path: &Path, rollup: &[SponsorYearRollup]) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "employer_id,year,sponsor_name,plan_count,plan_numbers,active,retired,separated,total_participants,total_liability,retiree_liability,annuity_purchases,benefits_paid,contributions,mean_equity,mean_fixed_income,annuitant_ratio")
        .map_err(io_err(path))?;
    for row in rollup {
        let line = [
            row.employer_id.clone(),
            row.year.to_string(),
            fmt_text(row.sponsor_name.as_deref()),
            row.plan_count.to_string(),
            fmt_text(Some(&row.plan_numbers)),
            fmt_count(row.active),
            fmt_count(row.retired),
            fmt_count(row.separated),
            fmt_count(row.total_participants),
            fmt_amount(row.total_liability),
            fmt_amount(row.retiree_liability),
            fmt_amount(row.annuity_purchases),
            fmt_amount(row.benefits_paid),
            fmt_amount(row.contributions),
            fmt_amount(row.mean_equity),
            fmt_amount(row.mean_fixed_income),
            fmt_amount(row.annuitant_ratio),
        ]
        .join(",");
        writeln!(out, "{line}").map_err(io_err(path))?;
    }
    out.flush().map_err(io_err(path))
}

pub fn write_diagnostics_json(path: &Path, diagnostics: &RunDiagnostics) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(diagnostics).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    fs::write(path, json).map_err(io_err(path))
}
