//! Human-readable markdown summary of a validator run.

use crate::models::scene_lists::SceneLists;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One QC check as rendered in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLine {
    pub name: String,
    pub passed: bool,
    pub note: String,
}

/// Everything the markdown summary shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    /// Ordered `key: value` lines of the QC summary.
    pub summary: Vec<(String, String)>,
    pub checks: Vec<CheckLine>,
    pub lists: SceneLists,
}

impl SummaryReport {
    /// Renders the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Validator v2\n\n");
        output.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for (key, value) in &self.summary {
            output.push_str(&format!("- {key}: {value}\n"));
        }
        output.push('\n');

        output.push_str("## QC Checks\n\n");
        output.push_str("| check | status | note |\n");
        output.push_str("|---|---|---|\n");
        for check in &self.checks {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                check.name,
                if check.passed { "PASS" } else { "FAIL" },
                check.note
            ));
        }
        output.push('\n');

        output.push_str(&format!("## Whitelist ({})\n\n", self.lists.whitelist.len()));
        push_scene_list(&mut output, &self.lists.whitelist);
        output.push_str(&format!("## Blacklist ({})\n\n", self.lists.blacklist.len()));
        push_scene_list(&mut output, &self.lists.blacklist);

        output
    }
}

fn push_scene_list(output: &mut String, scenes: &[String]) {
    if scenes.is_empty() {
        output.push_str("_none_\n\n");
    } else {
        output.push_str(&format!("{}\n\n", scenes.join(", ")));
    }
}

pub struct ReportWriter;

impl ReportWriter {
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_markdown(path: &Path, report: &SummaryReport) -> Result<()> {
        fs::write(path, report.to_markdown())
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> SummaryReport {
        SummaryReport {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            summary: vec![
                ("samples".into(), "1200".into()),
                ("qc_pass".into(), "false".into()),
            ],
            checks: vec![
                CheckLine {
                    name: "sample_size".into(),
                    passed: true,
                    note: "1200 rows >= 300".into(),
                },
                CheckLine {
                    name: "stability_threshold".into(),
                    passed: false,
                    note: "0.41 < 0.60".into(),
                },
            ],
            lists: SceneLists {
                whitelist: vec![],
                blacklist: vec!["SCENE_001".into(), "SCENE_002".into()],
            },
        }
    }

    #[test]
    fn markdown_lists_summary_and_checks() {
        let text = report().to_markdown();
        assert!(text.starts_with("# Validator v2\n"));
        assert!(text.contains("- samples: 1200\n"));
        assert!(text.contains("| stability_threshold | FAIL | 0.41 < 0.60 |"));
        assert!(text.contains("## Whitelist (0)\n\n_none_"));
        assert!(text.contains("SCENE_001, SCENE_002"));
    }

    #[test]
    fn write_markdown_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("validator_v2_report.md");
        ReportWriter::write_markdown(&path, &report()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("2024-05-01"));
    }
}
