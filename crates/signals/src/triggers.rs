use orderflow_validator_core::stats::quantile;
use orderflow_validator_core::{Result, ValidatorError};
use orderflow_validator_data::ObservationTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-column quantile thresholds and the flags they produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMatrix {
    /// Column -> (quantile level, threshold value).
    pub thresholds: BTreeMap<String, TriggerThreshold>,
    pub flags: BTreeMap<String, Vec<bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerThreshold {
    pub quantile: f64,
    pub value: f64,
}

impl TriggerMatrix {
    /// Rows flagged by `column`, 0 for an unknown column.
    #[must_use]
    pub fn count(&self, column: &str) -> usize {
        self.flags
            .get(column)
            .map_or(0, |f| f.iter().filter(|&&v| v).count())
    }
}

/// Flags every row whose value reaches the column's quantile threshold.
///
/// # Errors
/// Returns `ValidatorError::Configuration` for a missing column or a level
/// outside [0, 1].
pub fn build_trigger_matrix(
    table: &ObservationTable,
    levels: &BTreeMap<String, f64>,
) -> Result<TriggerMatrix> {
    let mut thresholds = BTreeMap::new();
    let mut flags = BTreeMap::new();

    for (column, &q) in levels {
        let values = table.require_numeric(column)?;
        if !(0.0..=1.0).contains(&q) {
            return Err(ValidatorError::configuration(format!(
                "trigger quantile for '{column}' must be in [0, 1], got {q}"
            )));
        }
        let value = quantile(values, q).ok_or_else(|| {
            ValidatorError::configuration(format!("trigger column '{column}' is empty"))
        })?;
        flags.insert(column.clone(), values.iter().map(|&v| v >= value).collect());
        thresholds.insert(column.clone(), TriggerThreshold { quantile: q, value });
    }

    tracing::debug!(columns = thresholds.len(), "Built trigger matrix");
    Ok(TriggerMatrix { thresholds, flags })
}
