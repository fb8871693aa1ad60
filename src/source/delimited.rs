//! Delimited text reader
//!
//! Decodes the raw bytes with the configured encoding (a UTF-8 byte order mark
//! is always stripped) and reads the header row plus data rows with `csv`.

use super::{SourceRow, SourceTable};
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for reading delimited text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    pub delimiter: char,
    /// Encoding label as understood by the WHATWG encoding standard
    pub encoding: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ';',
            encoding: "utf-8".to_string(),
        }
    }
}

impl CsvOptions {
    fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(anyhow!("Delimiter must be a single ASCII character, got '{}'", self.delimiter))
        }
    }
}

/// Read a delimited file from disk
pub fn read_file(path: &Path, options: &CsvOptions) -> Result<SourceTable> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;
    read_bytes(&bytes, options).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse delimited text from raw bytes
pub fn read_bytes(bytes: &[u8], options: &CsvOptions) -> Result<SourceTable> {
    let text = decode(bytes, &options.encoding)?;
    read_str(&text, options)
}

fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow!("Unknown encoding '{}'", label))?;

    // BOM sniffing takes precedence over the configured label
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("Source contained bytes invalid for {}; replaced", used.name());
    }
    debug!("Decoded {} bytes as {}", bytes.len(), used.name());
    Ok(text.into_owned())
}

fn read_str(text: &str, options: &CsvOptions) -> Result<SourceTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed data row {}", index + 1))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row = SourceRow::new(index + 1);
        for (i, column) in columns.iter().enumerate() {
            if column.is_empty() {
                continue;
            }
            row.insert(column.clone(), record.get(i).unwrap_or(""));
        }
        rows.push(row);
    }

    Ok(SourceTable {
        columns: columns.into_iter().filter(|c| !c.is_empty()).collect(),
        rows,
    })
}
