//! Scene whitelist/blacklist, rule sheet and QC checks.
//!
//! QC is fail-open: failing checks are reported and logged but never stop
//! the run or change the scene lists.

use crate::labels::{complete_rows, LabelledDataset};
use crate::stability::StabilityResult;
use crate::triggers::TriggerMatrix;
use crate::univariate::{ScreeningRecord, UnivariateSummary};
use orderflow_validator_core::{SceneUniverse, ValidatorConfig};
use orderflow_validator_data::{CheckLine, SceneLists};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whitelists every universe scene with at least one passing record.
///
/// Both lists keep the universe order, so together they partition it exactly.
#[must_use]
pub fn make_scene_lists(summary: &UnivariateSummary, universe: &SceneUniverse) -> SceneLists {
    let passing: BTreeSet<&str> = summary.passing().map(|r| r.scene.as_str()).collect();
    let (whitelist, blacklist): (Vec<String>, Vec<String>) = universe
        .scenes
        .iter()
        .cloned()
        .partition(|scene| passing.contains(scene.as_str()));
    SceneLists {
        whitelist,
        blacklist,
    }
}

/// One deployable rule row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRow {
    pub scene: String,
    pub filter: String,
    pub meta_signal: String,
    pub metric: String,
    #[serde(rename = "N")]
    pub n: usize,
    pub hit_rate: f64,
    pub uplift: f64,
    pub p_adjusted: f64,
}

impl From<&ScreeningRecord> for RuleRow {
    fn from(record: &ScreeningRecord) -> Self {
        Self {
            scene: record.scene.clone(),
            filter: record.filter.clone(),
            meta_signal: record.meta_signal.clone(),
            metric: record.metric.clone(),
            n: record.n,
            hit_rate: record.hit_rate,
            uplift: record.uplift,
            p_adjusted: record.p_adjusted,
        }
    }
}

/// Passing records of whitelisted scenes, in screening order.
#[must_use]
pub fn build_rule_sheet(summary: &UnivariateSummary, lists: &SceneLists) -> Vec<RuleRow> {
    summary
        .passing()
        .filter(|r| lists.is_whitelisted(&r.scene))
        .map(RuleRow::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcCheck {
    pub name: String,
    pub passed: bool,
    pub note: String,
}

impl QcCheck {
    fn new(name: &str, passed: bool, note: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            note,
        }
    }
}

impl From<&QcCheck> for CheckLine {
    fn from(check: &QcCheck) -> Self {
        Self {
            name: check.name.clone(),
            passed: check.passed,
            note: check.note.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcReport {
    pub checks: Vec<QcCheck>,
}

impl QcReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failing_checks(&self) -> impl Iterator<Item = &QcCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Runs the five QC checks.
#[must_use]
pub fn run_qc(data: &LabelledDataset, stability: &StabilityResult, config: &ValidatorConfig) -> QcReport {
    let rows = data.len();
    let positives = data.labels.positives();

    let present: BTreeSet<&str> = data.table.state_tags().iter().map(String::as_str).collect();
    let missing: Vec<&str> = config
        .required_state_tags
        .iter()
        .map(String::as_str)
        .filter(|tag| !present.contains(tag))
        .collect();

    let forward = &data.labels.forward_return;
    let tail_start = complete_rows(forward.len(), data.labels.horizon).min(forward.len());
    let leaked = forward[tail_start..].iter().filter(|&&r| r != 0.0).count();

    let checks = vec![
        QcCheck::new(
            "sample_size",
            rows >= config.minimum_samples,
            format!("{rows} rows, minimum {}", config.minimum_samples),
        ),
        QcCheck::new(
            "label_variation",
            positives > 0 && positives < rows,
            format!("{positives} positives of {rows}"),
        ),
        QcCheck::new(
            "regime_coverage",
            missing.is_empty(),
            if missing.is_empty() {
                format!("{} state tags present", present.len())
            } else {
                format!("missing {}", missing.join(", "))
            },
        ),
        QcCheck::new(
            "stability_threshold",
            stability.score >= config.stability_threshold,
            format!(
                "score {:.2}, threshold {:.2}",
                stability.score, config.stability_threshold
            ),
        ),
        QcCheck::new(
            "no_future_leakage",
            leaked == 0,
            format!("{leaked} tail rows reach past the table end"),
        ),
    ];

    let report = QcReport { checks };
    for check in report.failing_checks() {
        tracing::warn!(check = %check.name, note = %check.note, "QC check failed");
    }
    report
}

/// Ordered `key: value` lines for the markdown summary.
#[must_use]
pub fn qc_summary(
    data: &LabelledDataset,
    qc: &QcReport,
    stability: &StabilityResult,
    lists: &SceneLists,
    triggers: &TriggerMatrix,
) -> Vec<(String, String)> {
    let thresholds = triggers
        .thresholds
        .iter()
        .map(|(column, t)| format!("{column}>= {:.2}", t.value))
        .collect::<Vec<_>>()
        .join(", ");
    let failing = qc
        .failing_checks()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        ("samples".to_string(), data.len().to_string()),
        ("qc_pass".to_string(), qc.is_valid().to_string()),
        ("stability".to_string(), format!("{:.2}", stability.score)),
        (
            "whitelist".to_string(),
            format!("{} scenes", lists.whitelist.len()),
        ),
        ("trigger_thresholds".to_string(), thresholds),
        (
            "failing_checks".to_string(),
            if failing.is_empty() {
                "none".to_string()
            } else {
                failing
            },
        ),
    ]
}
