//! Univariate screening with scene / filter / meta-signal gating.
//!
//! Every (scene, filter, meta-signal, metric) slice gets a Welch two-sample
//! test of the metric between label classes, an uplift and a rolling
//! stability score. Benjamini–Hochberg correction is applied once across all
//! records, then the pass rule is evaluated.

use crate::labels::{LabelledDataset, DERIVED_COLUMNS};
use orderflow_validator_core::stats::{
    benjamini_hochberg, mean, rolling_mean, share_at_or_above, welch_t_test,
};
use orderflow_validator_core::{DecisionThresholds, Result, UnivariateConfig, ValidatorError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One screened slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub scene: String,
    pub filter: String,
    pub meta_signal: String,
    pub metric: String,
    /// Rows of the scene where the meta-signal fired.
    #[serde(rename = "N")]
    pub n: usize,
    /// Share of the scene's rows passing the filter.
    pub filter_rate: f64,
    pub hit_rate: f64,
    /// Metric mean at label 1 minus mean at label 0.
    pub uplift: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub p_adjusted: f64,
    pub reject: bool,
    pub stability: f64,
    pub passes_threshold: bool,
    pub fdr_alpha: f64,
}

/// Screener output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnivariateSummary {
    pub records: Vec<ScreeningRecord>,
    pub fdr_alpha: f64,
}

impl UnivariateSummary {
    pub fn passing(&self) -> impl Iterator<Item = &ScreeningRecord> {
        self.records.iter().filter(|r| r.passes_threshold)
    }
}

/// Rolling stability of a slice's label series.
///
/// Window `min(window, len)` raised to 5 for short slices, minimum
/// `max(3, window / 2)` observations per window.
#[must_use]
pub fn slice_stability(labels: &[f64], window: usize) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let window = window.min(labels.len()).max(5);
    let rolling = rolling_mean(labels, window, (window / 2).max(3));
    share_at_or_above(&rolling, 0.5)
}

/// Metric columns to screen: pinned list, or every numeric column except the
/// derived and excluded ones.
#[must_use]
pub fn metric_columns(data: &LabelledDataset, config: &UnivariateConfig) -> Vec<String> {
    if let Some(pinned) = &config.metrics {
        return pinned.clone();
    }
    data.table
        .numeric_columns()
        .filter(|c| !DERIVED_COLUMNS.contains(c))
        .filter(|c| !config.excluded_metrics.iter().any(|e| e == c))
        .map(str::to_string)
        .collect()
}

struct RawRecord {
    scene: String,
    filter: String,
    meta_signal: String,
    metric: String,
    n: usize,
    filter_rate: f64,
    hit_rate: f64,
    uplift: f64,
    t_stat: f64,
    p_value: f64,
    stability: f64,
}

/// Runs the screener.
///
/// # Errors
/// Returns `ValidatorError::EmptyLabel` when no row has a positive label and
/// `ValidatorError::Configuration` for unknown filters, meta-signals or
/// metric columns.
pub fn screen(
    data: &LabelledDataset,
    config: &UnivariateConfig,
    thresholds: &DecisionThresholds,
) -> Result<UnivariateSummary> {
    if data.labels.positives() == 0 {
        return Err(ValidatorError::EmptyLabel(
            "label column has no positive samples".to_string(),
        ));
    }

    let metrics = metric_columns(data, config);
    let metric_values = metrics
        .iter()
        .map(|m| data.table.require_numeric(m))
        .collect::<Result<Vec<_>>>()?;
    let filters = config
        .filters
        .iter()
        .map(|f| Ok((f.as_str(), data.filter(f)?)))
        .collect::<Result<Vec<_>>>()?;
    let meta_signals = config
        .meta_signals
        .iter()
        .map(|m| Ok((m.as_str(), data.meta_signal(m)?)))
        .collect::<Result<Vec<_>>>()?;
    let label = data.labels.label_values();

    let mut raw = Vec::new();
    let mut skipped = 0_usize;

    for (scene, rows) in data.rows_by_scene() {
        for &(filter_name, filter) in &filters {
            let passing = rows.iter().filter(|&&i| filter[i]).count();
            let filter_rate = passing as f64 / rows.len() as f64;

            for &(meta_name, meta) in &meta_signals {
                let subset: Vec<usize> = rows.iter().copied().filter(|&i| meta[i]).collect();
                if subset.is_empty() {
                    continue;
                }
                let y: Vec<f64> = subset.iter().map(|&i| label[i]).collect();
                let positives = y.iter().filter(|&&v| v > 0.5).count();
                if positives == 0 || positives == y.len() {
                    continue;
                }
                let stability = slice_stability(&y, config.stability_window);
                let hit_rate = positives as f64 / y.len() as f64;

                for (metric, values) in metrics.iter().zip(&metric_values) {
                    let (pos, neg): (Vec<f64>, Vec<f64>) = {
                        let mut pos = Vec::with_capacity(positives);
                        let mut neg = Vec::with_capacity(y.len() - positives);
                        for (&i, &l) in subset.iter().zip(&y) {
                            // missing cells drop out of the metric's classes
                            if !values[i].is_finite() {
                                continue;
                            }
                            if l > 0.5 {
                                pos.push(values[i]);
                            } else {
                                neg.push(values[i]);
                            }
                        }
                        (pos, neg)
                    };
                    if pos.len() < config.min_class_samples || neg.len() < config.min_class_samples {
                        let soft = ValidatorError::InsufficientSample {
                            context: format!("{scene}/{filter_name}/{meta_name}/{metric}"),
                            positives: pos.len(),
                            negatives: neg.len(),
                        };
                        debug!("Skipping slice: {soft}");
                        skipped += 1;
                        continue;
                    }
                    let Some(test) = welch_t_test(&pos, &neg) else {
                        skipped += 1;
                        continue;
                    };
                    let uplift = mean(&pos).unwrap_or(0.0) - mean(&neg).unwrap_or(0.0);

                    raw.push(RawRecord {
                        scene: scene.to_string(),
                        filter: filter_name.to_string(),
                        meta_signal: meta_name.to_string(),
                        metric: metric.clone(),
                        n: subset.len(),
                        filter_rate,
                        hit_rate,
                        uplift,
                        t_stat: test.statistic,
                        p_value: test.p_value.clamp(0.0, 1.0),
                        stability,
                    });
                }
            }
        }
    }

    let p_values: Vec<f64> = raw.iter().map(|r| r.p_value).collect();
    let fdr = benjamini_hochberg(&p_values, thresholds.fdr_alpha);

    let mut records: Vec<ScreeningRecord> = raw
        .into_iter()
        .zip(fdr.adjusted.into_iter().zip(fdr.reject))
        .map(|(r, (p_adjusted, reject))| {
            let passes_threshold = r.n >= thresholds.minimum_samples
                && reject
                && r.stability >= thresholds.stability_threshold;
            ScreeningRecord {
                scene: r.scene,
                filter: r.filter,
                meta_signal: r.meta_signal,
                metric: r.metric,
                n: r.n,
                filter_rate: r.filter_rate,
                hit_rate: r.hit_rate,
                uplift: r.uplift,
                t_stat: r.t_stat,
                p_value: r.p_value,
                p_adjusted,
                reject,
                stability: r.stability,
                passes_threshold,
                fdr_alpha: thresholds.fdr_alpha,
            }
        })
        .collect();

    // stable: ties keep filter / meta-signal generation order
    records.sort_by(|a, b| a.scene.cmp(&b.scene).then_with(|| a.metric.cmp(&b.metric)));

    info!(
        records = records.len(),
        skipped,
        passing = records.iter().filter(|r| r.passes_threshold).count(),
        "Univariate screening complete"
    );

    Ok(UnivariateSummary {
        records,
        fdr_alpha: thresholds.fdr_alpha,
    })
}
