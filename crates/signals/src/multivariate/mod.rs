//! Multivariate models over meta-signals and control covariates.
//!
//! The frequency model explains the binary label as a count (Poisson, with
//! a negative-binomial refit under overdispersion). The strength models
//! explain the forward-return magnitude with OLS and median quantile
//! regression on the same design matrix.

pub mod design;
pub mod glm;
pub mod ols;
pub mod quantile;

pub use design::{build_design, one_hot_levels, DesignMatrix, OneHotEncoding};
pub use glm::{fit_count_model, fit_glm, CountFamily, GlmFit};
pub use ols::fit_ols;
pub use quantile::fit_quantile;

use crate::labels::LabelledDataset;
use orderflow_validator_core::{MultivariateConfig, Result};
use orderflow_validator_data::ComboMatrixRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One fitted coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub variable: String,
    pub coef: f64,
    pub std_err: f64,
    /// z for the count models, t otherwise.
    pub statistic: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Fitted model with its coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    /// `poisson`, `negative_binomial`, `ols` or `quantile_<q>`.
    pub model: String,
    pub coefficients: Vec<Coefficient>,
    /// Poisson deviance / df_resid for the frequency model.
    pub dispersion: Option<f64>,
    pub nobs: usize,
    pub df_resid: f64,
}

impl RegressionSummary {
    #[must_use]
    pub fn coef(&self, variable: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.variable == variable)
            .map(|c| c.coef)
    }
}

/// Per meta-signal effect summary across the three models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationSummary {
    pub meta_signal: String,
    pub frequency_model: String,
    pub frequency_coef: Option<f64>,
    pub strength_coef: Option<f64>,
    pub quantile_coef: Option<f64>,
    /// Share of all rows where the meta-signal fired.
    pub q_rate: f64,
    /// Label mean over triggered rows.
    pub net_uplift: Option<f64>,
}

/// (group, meta-signal) trigger count and hit rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRecord {
    pub group: String,
    pub meta_signal: String,
    #[serde(rename = "N")]
    pub n: usize,
    pub hit_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultivariateResult {
    pub combinations: Vec<CombinationSummary>,
    pub state_breakdown: Vec<BreakdownRecord>,
    pub combo_matrix: Vec<ComboMatrixRecord>,
    pub frequency_model: RegressionSummary,
    pub strength_model: RegressionSummary,
    pub quantile_model: RegressionSummary,
}

/// Fits all models and builds the breakdown tables.
///
/// # Errors
/// Returns `ValidatorError::Configuration` for missing controls and
/// `ValidatorError::Numerical` if a model cannot be fit.
pub fn run_regressions(
    data: &LabelledDataset,
    config: &MultivariateConfig,
) -> Result<MultivariateResult> {
    let design = build_design(data, &config.meta_signals, &config.controls)?;
    let label = data.labels.label_values();
    let forward = &data.labels.forward_return;

    let frequency_model = fit_count_model(
        &design,
        &label,
        config.overdispersion_threshold,
        config.max_iter,
        config.tolerance,
    )?;
    let strength_model = fit_ols(&design, forward)?;
    let quantile_model = fit_quantile(&design, forward, config.quantile)?;

    let combinations = config
        .meta_signals
        .iter()
        .map(|meta| {
            let flags = data.meta_signal(meta)?;
            let fired = flags.iter().filter(|&&f| f).count();
            Ok(CombinationSummary {
                meta_signal: meta.clone(),
                frequency_model: frequency_model.model.clone(),
                frequency_coef: frequency_model.coef(meta),
                strength_coef: strength_model.coef(meta),
                quantile_coef: quantile_model.coef(meta),
                q_rate: fired as f64 / flags.len().max(1) as f64,
                net_uplift: hit_rate(flags.iter().enumerate().filter(|(_, &f)| f).map(|(i, _)| i), &label),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let combo_matrix = breakdown(&data.rows_by_scene(), data, &config.meta_signals, &label)?
        .into_iter()
        .map(|r| ComboMatrixRecord {
            scene: r.group,
            meta_signal: r.meta_signal,
            n: r.n as u64,
            hit_rate: r.hit_rate,
        })
        .collect();
    let state_breakdown = breakdown(&data.rows_by_state(), data, &config.meta_signals, &label)?;

    tracing::info!(
        frequency_model = %frequency_model.model,
        dispersion = ?frequency_model.dispersion,
        "Multivariate models fitted"
    );

    Ok(MultivariateResult {
        combinations,
        state_breakdown,
        combo_matrix,
        frequency_model,
        strength_model,
        quantile_model,
    })
}

fn hit_rate(rows: impl Iterator<Item = usize>, label: &[f64]) -> Option<f64> {
    let (n, sum) = rows.fold((0_usize, 0.0), |(n, s), i| (n + 1, s + label[i]));
    (n > 0).then(|| sum / n as f64)
}

fn breakdown(
    groups: &BTreeMap<&str, Vec<usize>>,
    data: &LabelledDataset,
    meta_signals: &[String],
    label: &[f64],
) -> Result<Vec<BreakdownRecord>> {
    let mut records = Vec::with_capacity(groups.len() * meta_signals.len());
    for (group, rows) in groups {
        for meta in meta_signals {
            let flags = data.meta_signal(meta)?;
            let triggered = rows.iter().copied().filter(|&i| flags[i]);
            let n = rows.iter().filter(|&&i| flags[i]).count();
            records.push(BreakdownRecord {
                group: (*group).to_string(),
                meta_signal: meta.clone(),
                n,
                hit_rate: hit_rate(triggered, label),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_validator_core::{LabelConfig, SceneUniverse};
    use orderflow_validator_data::generate_dataset;

    fn synthetic() -> LabelledDataset {
        let table = generate_dataset(1_200, 7, &SceneUniverse::numbered(20)).unwrap();
        LabelledDataset::build(table, &LabelConfig::default()).unwrap()
    }

    #[test]
    fn regressions_share_design_columns() {
        let data = synthetic();
        let result = run_regressions(&data, &MultivariateConfig::default()).unwrap();

        let names: Vec<_> = result
            .frequency_model
            .coefficients
            .iter()
            .map(|c| c.variable.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "const",
                "U1",
                "U2",
                "U3",
                "atr_norm_range",
                "spread_bps",
                "ls_norm",
                "session_id_eu",
                "session_id_us",
                "state_tag_TRANSITIONAL",
                "state_tag_TRENDING",
            ]
        );
        assert_eq!(result.strength_model.model, "ols");
        assert_eq!(result.quantile_model.model, "quantile_0.50");
        assert!(result.frequency_model.dispersion.is_some());
        assert_eq!(result.strength_model.coefficients.len(), names.len());
    }

    #[test]
    fn combination_rows_follow_meta_signals() {
        let data = synthetic();
        let result = run_regressions(&data, &MultivariateConfig::default()).unwrap();
        let metas: Vec<_> = result
            .combinations
            .iter()
            .map(|c| c.meta_signal.as_str())
            .collect();
        assert_eq!(metas, vec!["U1", "U2", "U3"]);
        for combo in &result.combinations {
            assert!((0.0..=1.0).contains(&combo.q_rate));
            assert!(combo.frequency_coef.is_some());
        }
    }

    #[test]
    fn combo_matrix_covers_every_scene_and_meta() {
        let data = synthetic();
        let result = run_regressions(&data, &MultivariateConfig::default()).unwrap();
        assert_eq!(result.combo_matrix.len(), 20 * 3);
        let total: u64 = result
            .combo_matrix
            .iter()
            .filter(|r| r.meta_signal == "U2")
            .map(|r| r.n)
            .sum();
        let fired = data.meta_signal("U2").unwrap().iter().filter(|&&f| f).count();
        assert_eq!(total, fired as u64);
        for record in &result.combo_matrix {
            assert_eq!(record.hit_rate.is_none(), record.n == 0);
        }
        assert_eq!(result.state_breakdown.len(), 3 * 3);
    }

    #[test]
    fn hit_rate_is_none_for_empty_group() {
        assert_eq!(hit_rate(std::iter::empty(), &[1.0]), None);
        assert_eq!(hit_rate([0, 1].into_iter(), &[1.0, 0.0]), Some(0.5));
    }
}
