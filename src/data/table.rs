//! CSV table loading.
//!
//! Supported format:
//! - UTF-8, comma-separated
//! - Mandatory header row naming every column
//! - Double-quoted fields with embedded commas and `""` escapes
//! - Blank lines are skipped; every other row must match the header width

use std::path::Path;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A string-typed table as exported by the knowledge-base tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn load(path: &Path) -> Result<Table> {
        let bytes = std::fs::read(path)?;
        Table::parse(&bytes)
    }

    /// Parses CSV bytes into a table.
    pub fn parse(data: &[u8]) -> Result<Table> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::data("CSV file is not valid UTF-8"))?;

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let headers: Vec<String> = match lines.next() {
            Some(line) => parse_csv_row(line.trim_end_matches('\r'))
                .into_iter()
                .map(|h| h.trim().to_string())
                .collect(),
            None => return Err(Error::data("CSV contains no header row")),
        };

        let mut rows = Vec::new();
        for (row_idx, line) in lines.enumerate() {
            let cells = parse_csv_row(line.trim_end_matches('\r'));
            if cells.len() != headers.len() {
                return Err(Error::data(format!(
                    "Row {}: expected {} columns, got {}",
                    row_idx + 1,
                    headers.len(),
                    cells.len()
                )));
            }
            rows.push(cells.into_iter().map(|c| c.trim().to_string()).collect());
        }

        if rows.is_empty() {
            return Err(Error::data("CSV contains no data rows after parsing"));
        }

        Ok(Table { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers.iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::config(format!("unknown column '{name}'")))
    }

    /// All cells of the named column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Parses a single CSV row, handling double-quoted fields.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote inside quoted field.
                    current.push('"');
                    chars.next();
                    continue;
                }
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
