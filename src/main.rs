//! Plan Tracker CLI
//!
//! Runs the multi-year reconciliation pipeline and, optionally, the full
//! analysis report for one plan.

use anyhow::{bail, Context};
use clap::Parser;
use plan_tracker::{
    build_report, run, PipelineConfig, SignalThresholds, TrackingId,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plan_tracker", about = "Pension plan filing reconciliation and trend signals")]
struct Cli {
    /// Directory with the per-year source files
    /// (actuarial_YYYY.csv, plan_metadata_YYYY.csv, financial_YYYY.csv)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for the output artifacts
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// First filing year to process
    #[arg(long)]
    start_year: i32,

    /// Last filing year to process (inclusive)
    #[arg(long)]
    end_year: i32,

    /// Tracking id (EIN-PPP) to write a full analysis report for
    #[arg(long)]
    plan: Option<String>,

    /// Override the de-risking composite score cutoff
    #[arg(long)]
    score_cutoff: Option<u32>,
}

fn parse_tracking_id(raw: &str) -> anyhow::Result<TrackingId> {
    match raw.rsplit_once('-') {
        Some((employer_id, plan_number)) if !employer_id.is_empty() && !plan_number.is_empty() => {
            Ok(TrackingId::new(employer_id, plan_number))
        }
        _ => bail!("tracking id must look like EIN-PPP, got {raw:?}"),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    if cli.end_year < cli.start_year {
        bail!("end year {} precedes start year {}", cli.end_year, cli.start_year);
    }

    let mut thresholds = SignalThresholds::default();
    if let Some(cutoff) = cli.score_cutoff {
        thresholds.derisking_score_cutoff = cutoff;
    }
    let config = PipelineConfig {
        data_dir: cli.data_dir,
        output_dir: cli.output_dir,
        start_year: cli.start_year,
        end_year: cli.end_year,
        thresholds,
    };

    println!("Plan Tracker v0.1.0");
    println!("===================\n");

    let output = run(&config).context("pipeline run failed")?;

    println!(
        "Processed years {}-{}: {} plans, {} plan-year rows",
        config.start_year, config.end_year, output.diagnostics.plan_count,
        output.diagnostics.row_count
    );
    for year in &output.diagnostics.years {
        match (&year.skip_reason, year.match_stats) {
            (Some(reason), _) => println!("  {} SKIPPED: {reason}", year.year),
            (None, Some(stats)) => println!(
                "  {}: {} rows ({} primary, {} secondary, {} unmatched)",
                year.year, year.output_rows, stats.primary_matches,
                stats.secondary_matches, stats.unmatched
            ),
            (None, None) => println!("  {}: {} rows", year.year, year.output_rows),
        }
    }
    println!("\nArtifacts written to: {}", config.output_dir.display());

    if let Some(raw) = &cli.plan {
        let tracking_id = parse_tracking_id(raw)?;
        let report = build_report(&output.table, &tracking_id, &config.thresholds)
            .with_context(|| format!("analysis failed for {tracking_id}"))?;

        let report_path = config.output_dir.join(format!("report_{tracking_id}.json"));
        fs::write(&report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("could not write {}", report_path.display()))?;

        println!("\nPlan {tracking_id} ({} filed years)", report.years.len());
        println!(
            "  De-risking: score {}/4{}",
            report.derisking.composite_score,
            if report.derisking.is_derisking { " -> FLAGGED" } else { "" }
        );
        println!("  Longevity:  score {}/4", report.longevity.composite_score);
        println!(
            "  Peers:      {} in cohort, {} outlier metric(s)",
            report.peer.peer_count, report.peer.composite_score
        );
        for point in &report.talking_points {
            println!("  - {point}");
        }
        println!("\nFull report written to: {}", report_path.display());
    }

    Ok(())
}
