//! Source file readers
//!
//! Delimited text and BMEcat XML are both parsed into a [`SourceTable`]: an
//! ordered list of column names plus rows of named string values.

pub mod bmecat;
pub mod delimited;

pub use delimited::CsvOptions;

use anyhow::{Result, bail};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// One parsed input row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    /// 1-based data row number (header excluded)
    pub line: usize,
    pub values: HashMap<String, String>,
}

impl SourceRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            values: HashMap::new(),
        }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K, V>(line: usize, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            line,
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }
}

/// Parsed source file
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub columns: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl SourceTable {
    /// First `n` rows, used as samples for mapping suggestions
    pub fn sample(&self, n: usize) -> &[SourceRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    BmeCat,
}

/// Detect the source format from the file extension
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "tsv" | "txt" => Ok(SourceFormat::Delimited),
        "xml" => Ok(SourceFormat::BmeCat),
        _ => bail!("Unsupported source file type: {}", path.display()),
    }
}

/// Read any supported source file
pub fn read_source(path: &Path, options: &CsvOptions) -> Result<SourceTable> {
    let table = match detect_format(path)? {
        SourceFormat::Delimited => delimited::read_file(path, options)?,
        SourceFormat::BmeCat => bmecat::read_file(path)?,
    };
    info!(
        "Parsed {}: {} rows, {} columns",
        path.display(),
        table.rows.len(),
        table.columns.len()
    );
    Ok(table)
}
