//! Record matching and deduplication across per-year source tables

mod dedup;
mod matcher;

pub use dedup::{deduplicate, verify_unique, DedupStats};
pub use matcher::{match_year, MatchStats};
