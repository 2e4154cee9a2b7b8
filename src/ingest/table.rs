//! Raw source table reader
//!
//! Yearly source files arrive as row-oriented text tables with string-typed
//! columns and no consistent encoding. This module reads one file into a
//! [`RawTable`]: normalized headers plus untyped string rows, which the
//! per-source normalizers then map onto the canonical schema.

use crate::error::PipelineError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One raw source table: normalized headers and string rows.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

/// Normalize a header the way every alias table expects it:
/// trimmed, uppercased, spaces and hyphens collapsed to underscores.
fn normalize_header(raw: &str) -> String {
    raw.trim().to_uppercase().replace([' ', '-'], "_")
}

/// Decode raw bytes, trying UTF-8 (with BOM sniff for UTF-16 variants)
/// first and falling back to Windows-1252/Latin-1.
fn decode_bytes(bytes: &[u8], path: &Path) -> Result<String, PipelineError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _, had_errors) = encoding.decode(&bytes[bom_len..]);
        if had_errors {
            return Err(PipelineError::Encoding { path: path.to_path_buf() });
        }
        debug!("{}: decoded as {} via BOM", path.display(), encoding.name());
        return Ok(text.into_owned());
    }

    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(PipelineError::Encoding { path: path.to_path_buf() });
    }
    debug!("{}: decoded as windows-1252 fallback", path.display());
    Ok(text.into_owned())
}

impl RawTable {
    /// Read a table from a file, tolerating UTF-8, UTF-16 (BOM) and
    /// Windows-1252 sources.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = decode_bytes(&bytes, path)?;
        Self::from_csv_text(&text).map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a table from already-decoded text (test entry point).
    pub fn from_csv_text(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(normalize_header)
            .collect();

        let mut index = HashMap::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers
            index.entry(h.clone()).or_insert(i);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        Ok(RawTable { headers, index, rows })
    }

    /// Column position of an exact canonical header, if present.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.index.get(header).copied()
    }

    /// First alias present in the table, in alias-list order.
    /// First-match-wins: conflicting aliases are never merged.
    pub fn resolve(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|a| self.column(a))
    }

    /// Cell value for a row/column position, empty when the row is short.
    pub fn cell<'a>(&'a self, row: &'a [String], col: Option<usize>) -> &'a str {
        col.and_then(|c| row.get(c)).map(String::as_str).unwrap_or("")
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
