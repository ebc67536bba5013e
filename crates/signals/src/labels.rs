//! Forward returns, binary labels, quantile filters and meta-signals.
//!
//! Everything here is a pure function of the observation table and the label
//! configuration. The resulting [`LabelledDataset`] is the read-only input of
//! every downstream stage.

use orderflow_validator_core::stats::quantile;
use orderflow_validator_core::{LabelConfig, Result, ValidatorError};
use orderflow_validator_data::ObservationTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// High-return filter.
pub const RE: &str = "RE";
/// High-volatility filter.
pub const HV: &str = "HV";
/// High-flow filter.
pub const HF: &str = "HF";

/// Flow-confirmed move in a calm tape: `RE ∧ HF ∧ ¬HV`.
pub const U1: &str = "U1";
/// Return breakout under high volatility: `RE ∧ HV`.
pub const U2: &str = "U2";
/// Heavy flow without price progress: `HF ∧ ¬RE`.
pub const U3: &str = "U3";

/// Columns derived by the label builder, never screened as metrics.
pub const DERIVED_COLUMNS: [&str; 8] = ["label", "forward_return", RE, HV, HF, U1, U2, U3];

/// Thresholds the three filters were cut at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterThresholds {
    pub return_threshold: f64,
    pub volatility_threshold: f64,
    pub flow_threshold: f64,
}

/// Per-row label outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelArtifacts {
    pub forward_return: Vec<f64>,
    pub label: Vec<bool>,
    pub filters: BTreeMap<String, Vec<bool>>,
    pub meta_signals: BTreeMap<String, Vec<bool>>,
    pub thresholds: FilterThresholds,
    pub horizon: usize,
}

impl LabelArtifacts {
    /// Label as 0/1 floats.
    #[must_use]
    pub fn label_values(&self) -> Vec<f64> {
        self.label.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect()
    }

    #[must_use]
    pub fn positives(&self) -> usize {
        self.label.iter().filter(|&&l| l).count()
    }
}

/// Sum of the next `horizon` returns, aligned with the decision row.
///
/// Row `i` holds `returns[i] + ... + returns[i + horizon - 1]`; the last
/// `horizon - 1` rows have no complete window and hold 0.0.
///
/// # Errors
/// Returns `ValidatorError::Configuration` when `horizon` is zero.
///
/// # Examples
/// ```
/// use orderflow_validator_signals::labels::forward_returns;
///
/// let fwd = forward_returns(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
/// assert_eq!(fwd, vec![3.0, 5.0, 7.0, 0.0]);
/// ```
pub fn forward_returns(returns: &[f64], horizon: usize) -> Result<Vec<f64>> {
    if horizon == 0 {
        return Err(ValidatorError::configuration("horizon must be at least 1"));
    }
    let mut out = vec![0.0; returns.len()];
    for (i, window) in returns.windows(horizon).enumerate() {
        out[i] = window.iter().sum();
    }
    Ok(out)
}

/// Number of leading rows whose forward window is complete.
#[must_use]
pub fn complete_rows(len: usize, horizon: usize) -> usize {
    (len + 1).saturating_sub(horizon.max(1))
}

/// Builds forward returns, label, filters and meta-signals.
///
/// # Errors
/// Returns `ValidatorError::Configuration` if the return, volatility or flow
/// column is missing, a quantile level is outside (0, 1), or the table is
/// empty.
pub fn build_labels(table: &ObservationTable, config: &LabelConfig) -> Result<LabelArtifacts> {
    let returns = table.require_numeric(&config.return_column)?;
    let volatility = table.require_numeric(&config.volatility_column)?;
    let flow = table.require_numeric(&config.flow_column)?;
    let abs_flow: Vec<f64> = flow.iter().map(|v| v.abs()).collect();

    let forward_return = forward_returns(returns, config.horizon)?;
    let complete = complete_rows(returns.len(), config.horizon);
    let label: Vec<bool> = forward_return
        .iter()
        .enumerate()
        .map(|(i, &r)| i < complete && r > config.threshold)
        .collect();

    let thresholds = FilterThresholds {
        return_threshold: level(returns, config.return_quantile, "labels.return_quantile")?,
        volatility_threshold: level(
            volatility,
            config.volatility_quantile,
            "labels.volatility_quantile",
        )?,
        flow_threshold: level(&abs_flow, config.flow_quantile, "labels.flow_quantile")?,
    };

    let re = at_or_above(returns, thresholds.return_threshold);
    let hv = at_or_above(volatility, thresholds.volatility_threshold);
    let hf = at_or_above(&abs_flow, thresholds.flow_threshold);

    let u1 = zip3(&re, &hf, &hv, |r, f, v| r && f && !v);
    let u2 = zip3(&re, &hv, &hf, |r, v, _| r && v);
    let u3 = zip3(&hf, &re, &hv, |f, r, _| f && !r);

    let filters = BTreeMap::from([(RE.to_string(), re), (HV.to_string(), hv), (HF.to_string(), hf)]);
    let meta_signals =
        BTreeMap::from([(U1.to_string(), u1), (U2.to_string(), u2), (U3.to_string(), u3)]);

    tracing::debug!(
        horizon = config.horizon,
        positives = label.iter().filter(|&&l| l).count(),
        rows = label.len(),
        "Built labels"
    );

    Ok(LabelArtifacts {
        forward_return,
        label,
        filters,
        meta_signals,
        thresholds,
        horizon: config.horizon,
    })
}

fn level(values: &[f64], q: f64, name: &str) -> Result<f64> {
    if !(q > 0.0 && q < 1.0) {
        return Err(ValidatorError::configuration(format!(
            "{name} must be in (0, 1), got {q}"
        )));
    }
    quantile(values, q)
        .ok_or_else(|| ValidatorError::configuration("observation table is empty"))
}

fn at_or_above(values: &[f64], threshold: f64) -> Vec<bool> {
    values.iter().map(|&v| v >= threshold).collect()
}

fn zip3(a: &[bool], b: &[bool], c: &[bool], f: impl Fn(bool, bool, bool) -> bool) -> Vec<bool> {
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((&x, &y), &z)| f(x, y, z))
        .collect()
}

/// Observation table joined with its label artifacts.
#[derive(Debug, Clone)]
pub struct LabelledDataset {
    pub table: ObservationTable,
    pub labels: LabelArtifacts,
}

impl LabelledDataset {
    /// # Errors
    /// See [`build_labels`].
    pub fn build(table: ObservationTable, config: &LabelConfig) -> Result<Self> {
        let labels = build_labels(&table, config)?;
        Ok(Self { table, labels })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// # Errors
    /// Returns `ValidatorError::Configuration` for an unknown filter name.
    pub fn filter(&self, name: &str) -> Result<&[bool]> {
        self.labels
            .filters
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ValidatorError::configuration(format!("unknown filter '{name}'")))
    }

    /// # Errors
    /// Returns `ValidatorError::Configuration` for an unknown meta-signal.
    pub fn meta_signal(&self, name: &str) -> Result<&[bool]> {
        self.labels
            .meta_signals
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                ValidatorError::configuration(format!("unknown meta-signal '{name}'"))
            })
    }

    /// Row indices per scene, scenes ascending, rows in table order.
    #[must_use]
    pub fn rows_by_scene(&self) -> BTreeMap<&str, Vec<usize>> {
        group_rows(self.table.scenes())
    }

    /// Row indices per state tag, tags ascending.
    #[must_use]
    pub fn rows_by_state(&self) -> BTreeMap<&str, Vec<usize>> {
        group_rows(self.table.state_tags())
    }
}

fn group_rows(keys: &[String]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups.entry(key.as_str()).or_default().push(i);
    }
    groups
}
