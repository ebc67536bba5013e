//! Rolling hit-rate stability per (scene, meta-signal).

use crate::labels::LabelledDataset;
use orderflow_validator_core::stats::{rolling_mean, share_at_or_above};
use orderflow_validator_core::{Result, StabilityConfig};
use serde::{Deserialize, Serialize};

/// Rolling windows below this length are widened.
const SHORT_WINDOW: usize = 10;
const MIN_WINDOW: usize = 5;
const HIT_LEVEL: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityRecord {
    pub scene: String,
    pub meta_signal: String,
    /// Share of rolling windows with hit rate >= 0.5.
    pub stability: f64,
    #[serde(rename = "N")]
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityResult {
    pub records: Vec<StabilityRecord>,
    /// Mean of record scores, 0.0 when no group qualified.
    pub score: f64,
}

/// Stability of one triggered label series.
#[must_use]
pub fn series_stability(labels: &[f64], window: usize) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let mut window = window.min(labels.len());
    if window < SHORT_WINDOW {
        window = labels.len().max(MIN_WINDOW);
    }
    let min_periods = (window / 3).max(3);
    share_at_or_above(&rolling_mean(labels, window, min_periods), HIT_LEVEL)
}

/// Scores every (scene, meta-signal) group with enough triggered rows.
///
/// Scenes iterate ascending, meta-signals in the given order.
///
/// # Errors
/// Returns `ValidatorError::Configuration` for an unknown meta-signal.
pub fn analyze(
    data: &LabelledDataset,
    config: &StabilityConfig,
    meta_signals: &[String],
) -> Result<StabilityResult> {
    let label = data.labels.label_values();
    let mut records = Vec::new();

    for (scene, rows) in data.rows_by_scene() {
        for meta in meta_signals {
            let flags = data.meta_signal(meta)?;
            let series: Vec<f64> = rows.iter().filter(|&&i| flags[i]).map(|&i| label[i]).collect();
            if series.len() < config.min_group_size {
                tracing::debug!(scene, meta_signal = %meta, n = series.len(), "Stability group too small");
                continue;
            }
            records.push(StabilityRecord {
                scene: scene.to_string(),
                meta_signal: meta.clone(),
                stability: series_stability(&series, config.window),
                n: series.len(),
            });
        }
    }

    let score = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.stability).sum::<f64>() / records.len() as f64
    };
    tracing::info!(groups = records.len(), score, "Stability analysis complete");

    Ok(StabilityResult { records, score })
}
