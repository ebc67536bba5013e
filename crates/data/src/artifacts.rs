//! Writes the full artifact set of one run.

use crate::models::combo_matrix::ComboMatrixRecord;
use crate::models::scene_lists::SceneLists;
use crate::parquet_storage::ParquetStorage;
use crate::report_writer::{ReportWriter, SummaryReport};
use crate::rules::RuleStore;
use crate::workbook::Workbook;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Outputs produced by a run, ready to persist.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub workbook: Workbook,
    pub combo_matrix: Vec<ComboMatrixRecord>,
    pub lists: SceneLists,
    pub report: SummaryReport,
}

/// Where each artifact landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub excel: PathBuf,
    pub parquet: PathBuf,
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub rules: PathBuf,
}

impl ArtifactPaths {
    /// Label/path pairs in display order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &Path); 5] {
        [
            ("excel", self.excel.as_path()),
            ("parquet", self.parquet.as_path()),
            ("json", self.json.as_path()),
            ("markdown", self.markdown.as_path()),
            ("rules", self.rules.as_path()),
        ]
    }
}

pub struct ArtifactWriter<'a> {
    results_dir: &'a Path,
    rule_sync_path: &'a Path,
}

impl<'a> ArtifactWriter<'a> {
    #[must_use]
    pub fn new(results_dir: &'a Path, rule_sync_path: &'a Path) -> Self {
        Self {
            results_dir,
            rule_sync_path,
        }
    }

    /// Writes workbook, parquet matrix, scene lists, report and rule file.
    ///
    /// # Errors
    /// Returns an error on the first artifact that cannot be written.
    pub fn write_all(&self, artifacts: &RunArtifacts, date: NaiveDate) -> Result<ArtifactPaths> {
        fs::create_dir_all(self.results_dir).with_context(|| {
            format!(
                "Failed to create results directory {}",
                self.results_dir.display()
            )
        })?;

        let paths = ArtifactPaths {
            excel: self.results_dir.join(Workbook::dated_name(date)),
            parquet: self.results_dir.join("combo_matrix.parquet"),
            json: self.results_dir.join("white_black_list.json"),
            markdown: self.results_dir.join("validator_v2_report.md"),
            rules: self.rule_sync_path.to_path_buf(),
        };

        artifacts.workbook.write(&paths.excel)?;
        ParquetStorage::write_combo_matrix(&paths.parquet, &artifacts.combo_matrix)?;
        RuleStore::write_lists(&paths.json, &artifacts.lists)?;
        ReportWriter::write_markdown(&paths.markdown, &artifacts.report)?;
        RuleStore::sync_rules(&paths.rules, &artifacts.lists)?;

        tracing::info!(
            results_dir = %self.results_dir.display(),
            sheets = artifacts.workbook.sheets.len(),
            "Wrote validator artifacts"
        );
        Ok(paths)
    }
}
