//! Pipeline error taxonomy
//!
//! Row-level problems (missing identifiers, malformed values) are recovered
//! locally and surface as counts in the per-stage stats structs; the variants
//! here are the file-level and invariant failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file unreadable under every attempted encoding
    #[error("could not decode {} with any supported encoding", path.display())]
    Encoding { path: PathBuf },

    #[error("malformed table in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required join-key column has no recognizable alias in the source.
    /// Non-key fields missing an alias only warn; the key itself is fatal
    /// for the table.
    #[error("{table} table has no recognizable {field} column")]
    MissingJoinKey {
        table: &'static str,
        field: &'static str,
    },

    /// Post-deduplication uniqueness violation. This is a correctness bug
    /// and halts processing for the year rather than silently picking a row.
    #[error("duplicate plan-year after deduplication: {tracking_id} year {year}")]
    DuplicateKey { tracking_id: String, year: i32 },

    /// The authoritative actuarial source produced no rows for the year
    #[error("authoritative actuarial source for {year} is empty")]
    EmptyAuthoritativeSource { year: i32 },
}
