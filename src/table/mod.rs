// src/table/mod.rs
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use std::path::Path;

/// Row-oriented table, every cell held as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Column names, from the header row of the source file.
    pub headers: Vec<String>,
    /// Data rows, each padded to exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Load `path` as a banner-prefixed CSV: the first record is discarded
    /// (institutional banner line), the second record is the header, and
    /// everything after it is data. All cells are read as plain text.
    ///
    /// Rows shorter than the header are padded with empty cells; longer rows
    /// are truncated to the header width.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("opening input CSV {:?}", path.as_ref()))?;

        let mut headers: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut seen_banner = false;

        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| {
                format!("CSV parse error in {:?} at record {}", path.as_ref(), idx)
            })?;

            if !seen_banner {
                seen_banner = true;
                continue;
            }

            let cells: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            match headers {
                None => headers = Some(cells),
                Some(ref h) => {
                    let mut row = cells;
                    row.resize(h.len(), String::new());
                    rows.push(row);
                }
            }
        }

        let Some(headers) = headers else {
            bail!(
                "input {:?} has no header row after the banner line",
                path.as_ref()
            );
        };

        Ok(Self { headers, rows })
    }

    /// Index of the column named exactly `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the column named `name`, appending an empty column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: String) {
        self.rows[row][col] = value;
    }
}
