//! Loading delimited text into rows of cells, shared by the tabular readers.

use std::path::Path;

use crate::error::{ImportError, Result};

/// Rows scanned when looking for the real header below decorative metadata rows
pub const MAX_HEADER_SCAN_ROWS: usize = 10;

/// Decode file bytes as UTF-8, falling back to ISO-8859-1 (every byte maps to
/// the code point of the same value) for exports written by Windows tools.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn sniff_delimiter(path: &Path, text: &str) -> u8 {
    let is_tsv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    if is_tsv {
        return b'\t';
    }
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.matches('\t').count() > first_line.matches(',').count() {
        b'\t'
    } else {
        b','
    }
}

/// Every row of a delimited file, cells untrimmed. Rows may differ in length.
pub fn load_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(path, &text))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Header cells that carry a real column name. Blank cells and the
/// `Unnamed: N` placeholders that spreadsheet exports write are skipped.
pub fn named_columns(row: &[String]) -> Vec<String> {
    row.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && !c.starts_with("Unnamed"))
        .map(str::to_string)
        .collect()
}

/// A header row plus the data rows under it
#[derive(Debug, Clone)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table whose header is `rows[header_row]`. Header names are trimmed.
    pub fn from_rows(mut rows: Vec<Vec<String>>, header_row: usize) -> Result<Self> {
        if header_row >= rows.len() {
            return Err(ImportError::MissingColumns {
                missing: vec!["header row".to_string()],
                found: Vec::new(),
            });
        }
        let data = rows.split_off(header_row + 1);
        let header = rows
            .pop()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self { header, rows: data })
    }

    /// Index of the first column whose trimmed name equals one of `names`
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.header.iter().position(|h| h == name))
    }

    pub fn require(&self, names: &[&str]) -> Result<usize> {
        self.column(names).ok_or_else(|| ImportError::MissingColumns {
            missing: names.iter().map(|n| n.to_string()).collect(),
            found: self.header.clone(),
        })
    }

    /// Index of the first column whose name starts with `prefix`, excluding exact `except` names
    pub fn column_with_prefix(&self, prefix: &str, except: &[&str]) -> Option<usize> {
        self.header
            .iter()
            .position(|h| h.starts_with(prefix) && !except.contains(&h.as_str()))
    }

    /// Non-empty trimmed cell value
    pub fn cell<'a>(row: &'a [String], column: Option<usize>) -> Option<&'a str> {
        column
            .and_then(|i| row.get(i))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Data rows that have at least one non-empty cell
    pub fn data_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows
            .iter()
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
    }
}
