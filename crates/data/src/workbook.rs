//! Multi-sheet tabular report.
//!
//! A workbook is written as a directory holding one CSV file per sheet plus
//! a `manifest.json` that lists the sheets in order.

use crate::csv_storage::CsvStorage;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One named table of stringified cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len(), "sheet {}", self.name);
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` for the named column.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }
}

/// Formats a float cell; non-finite values become empty cells.
#[must_use]
pub fn float_cell(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

#[must_use]
pub fn optional_cell(value: Option<f64>) -> String {
    value.map(float_cell).unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    workbook: &'a str,
    sheets: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    name: &'a str,
    file: String,
    rows: usize,
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Directory name for a workbook produced on `date`.
    #[must_use]
    pub fn dated_name(date: NaiveDate) -> String {
        format!("OF_V5_stats_{}", date.format("%Y%m%d"))
    }

    /// Writes every sheet to `<dir>/<sheet>.csv` plus `manifest.json`.
    ///
    /// # Errors
    /// Returns error if the directory or any file cannot be written.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create workbook directory: {}", dir.display()))?;

        let workbook_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workbook");
        let mut manifest = Manifest {
            workbook: workbook_name,
            sheets: Vec::with_capacity(self.sheets.len()),
        };

        for sheet in &self.sheets {
            let file = format!("{}.csv", sheet.name);
            CsvStorage::write_sheet(&dir.join(&file), sheet)?;
            manifest.sheets.push(ManifestEntry {
                name: &sheet.name,
                file,
                rows: sheet.len(),
            });
        }

        let manifest_path = dir.join("manifest.json");
        let mut json = serde_json::to_string_pretty(&manifest)?;
        json.push('\n');
        fs::write(&manifest_path, json)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        Ok(dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dated_name_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Workbook::dated_name(date), "OF_V5_stats_20240309");
    }

    #[test]
    fn float_cells_blank_non_finite() {
        assert_eq!(float_cell(0.25), "0.25");
        assert_eq!(float_cell(f64::NAN), "");
        assert_eq!(optional_cell(None), "");
    }

    #[test]
    fn write_creates_sheets_and_manifest() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("OF_V5_stats_20240101");

        let mut book = Workbook::new();
        let mut a = Sheet::new("univariate", &["scene", "p_value"]);
        a.push_row(vec!["S1".into(), "0.01".into()]);
        book.add(a);
        book.add(Sheet::new("stability", &["scene", "meta_signal", "stability"]));

        book.write(&target).unwrap();

        assert!(target.join("univariate.csv").exists());
        assert!(target.join("stability.csv").exists());
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(target.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["sheets"][0]["name"], "univariate");
        assert_eq!(manifest["sheets"][0]["rows"], 1);
        assert_eq!(manifest["sheets"][1]["file"], "stability.csv");
    }

    #[test]
    fn cell_lookup_by_column() {
        let mut sheet = Sheet::new("s", &["a", "b"]);
        sheet.push_row(vec!["1".into(), "2".into()]);
        assert_eq!(sheet.cell(0, "b"), Some("2"));
        assert_eq!(sheet.cell(0, "c"), None);
        assert_eq!(sheet.cell(1, "a"), None);
    }
}
