use crate::error::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Run-scoped configuration for validator v2.
///
/// Loaded once by [`crate::ConfigLoader`] and passed by reference into every
/// pipeline stage. Nothing here is mutated after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub results_dir: PathBuf,
    /// Rule file consumed by the decision-tree engine.
    pub rule_sync_path: PathBuf,
    pub scenes_whitelist: PathBuf,
    pub costs_config: PathBuf,
    pub input: InputConfig,
    pub minimum_samples: usize,
    pub fdr_alpha: f64,
    pub stability_threshold: f64,
    pub labels: LabelConfig,
    pub univariate: UnivariateConfig,
    pub stability: StabilityConfig,
    pub multivariate: MultivariateConfig,
    /// Column name -> quantile level for the trigger matrix.
    pub triggers: BTreeMap<String, f64>,
    /// Regime tags that must all appear in the data for QC to pass.
    pub required_state_tags: Vec<String>,
    /// Run the independent analysis stages on scoped threads.
    pub parallel: bool,
}

/// Where the observation table comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputConfig {
    Synthetic { rows: usize, seed: u64 },
    Csv { path: PathBuf },
    JsonLines { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Forward-return horizon in periods.
    pub horizon: usize,
    /// Label is 1 when the forward return is strictly above this value.
    pub threshold: f64,
    pub return_column: String,
    pub volatility_column: String,
    /// Flow z-score column; the filter uses its absolute value.
    pub flow_column: String,
    pub return_quantile: f64,
    pub volatility_quantile: f64,
    pub flow_quantile: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnivariateConfig {
    pub filters: Vec<String>,
    pub meta_signals: Vec<String>,
    /// Pinned metric list. `None` screens every numeric column.
    pub metrics: Option<Vec<String>>,
    /// Numeric columns never screened as metrics.
    pub excluded_metrics: Vec<String>,
    /// Minimum rows per label class inside a slice.
    pub min_class_samples: usize,
    pub stability_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub window: usize,
    /// Groups triggered fewer times than this are excluded.
    pub min_group_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultivariateConfig {
    pub meta_signals: Vec<String>,
    pub controls: Vec<String>,
    pub quantile: f64,
    /// Deviance/df above which the count model switches to negative binomial.
    pub overdispersion_threshold: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

/// Thresholds shared by the screener and the decision aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub minimum_samples: usize,
    pub fdr_alpha: f64,
    pub stability_threshold: f64,
}

/// One fee/slippage assumption for cost sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostScenario {
    pub taker_fee_bps: f64,
    pub maker_fee_bps: f64,
    pub slippage_bps: f64,
}

impl CostScenario {
    /// Round-trip cost charged against gross return, as a fraction.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        (self.taker_fee_bps + self.slippage_bps) / 10_000.0
    }
}

/// The externally configured set of valid scene identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneUniverse {
    pub scenes: Vec<String>,
}

impl SceneUniverse {
    #[must_use]
    pub fn new(scenes: Vec<String>) -> Self {
        Self { scenes }
    }

    /// Fallback universe `SCENE_001..SCENE_{count}`.
    #[must_use]
    pub fn numbered(count: usize) -> Self {
        Self::new((1..=count).map(|idx| format!("SCENE_{idx:03}")).collect())
    }

    #[must_use]
    pub fn contains(&self, scene: &str) -> bool {
        self.scenes.iter().any(|s| s == scene)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            rule_sync_path: PathBuf::from("configs/trade_rules.json"),
            scenes_whitelist: PathBuf::from("config/scenes_whitelist.toml"),
            costs_config: PathBuf::from("config/costs.toml"),
            input: InputConfig::Synthetic {
                rows: 1_200,
                seed: 7,
            },
            minimum_samples: 300,
            fdr_alpha: 0.10,
            stability_threshold: 0.6,
            labels: LabelConfig::default(),
            univariate: UnivariateConfig::default(),
            stability: StabilityConfig::default(),
            multivariate: MultivariateConfig::default(),
            triggers: BTreeMap::from([
                ("absorption_strength".to_string(), 0.9),
                ("cvd_z".to_string(), 0.9),
                ("imbalance".to_string(), 0.9),
            ]),
            required_state_tags: vec![
                "BALANCED".to_string(),
                "TRENDING".to_string(),
                "TRANSITIONAL".to_string(),
            ],
            parallel: false,
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            threshold: 0.0,
            return_column: "return".to_string(),
            volatility_column: "vol_pctl".to_string(),
            flow_column: "cvd_z".to_string(),
            return_quantile: 0.8,
            volatility_quantile: 0.7,
            flow_quantile: 0.8,
        }
    }
}

impl Default for UnivariateConfig {
    fn default() -> Self {
        Self {
            filters: vec!["RE".to_string(), "HV".to_string(), "HF".to_string()],
            meta_signals: vec!["U1".to_string(), "U2".to_string(), "U3".to_string()],
            metrics: None,
            excluded_metrics: Vec::new(),
            min_class_samples: 5,
            stability_window: 50,
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window: 90,
            min_group_size: 3,
        }
    }
}

impl Default for MultivariateConfig {
    fn default() -> Self {
        Self {
            meta_signals: vec!["U1".to_string(), "U2".to_string(), "U3".to_string()],
            controls: vec![
                "session_id".to_string(),
                "atr_norm_range".to_string(),
                "spread_bps".to_string(),
                "state_tag".to_string(),
                "ls_norm".to_string(),
            ],
            quantile: 0.5,
            overdispersion_threshold: 1.5,
            max_iter: 100,
            tolerance: 1e-8,
        }
    }
}

impl ValidatorConfig {
    #[must_use]
    pub fn thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            minimum_samples: self.minimum_samples,
            fdr_alpha: self.fdr_alpha,
            stability_threshold: self.stability_threshold,
        }
    }

    /// Rejects out-of-range values before any computation starts.
    ///
    /// # Errors
    /// Returns `ValidatorError::Configuration` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.labels.horizon == 0 {
            return Err(ValidatorError::configuration(
                "labels.horizon must be at least 1",
            ));
        }
        open_unit("fdr_alpha", self.fdr_alpha)?;
        open_unit("labels.return_quantile", self.labels.return_quantile)?;
        open_unit("labels.volatility_quantile", self.labels.volatility_quantile)?;
        open_unit("labels.flow_quantile", self.labels.flow_quantile)?;
        open_unit("multivariate.quantile", self.multivariate.quantile)?;
        if !(0.0..=1.0).contains(&self.stability_threshold) {
            return Err(ValidatorError::configuration(format!(
                "stability_threshold must be in [0, 1], got {}",
                self.stability_threshold
            )));
        }
        for (column, quantile) in &self.triggers {
            if !(0.0..=1.0).contains(quantile) {
                return Err(ValidatorError::configuration(format!(
                    "triggers.{column} quantile must be in [0, 1], got {quantile}"
                )));
            }
        }
        if self.univariate.min_class_samples == 0 {
            return Err(ValidatorError::configuration(
                "univariate.min_class_samples must be at least 1",
            ));
        }
        if self.multivariate.overdispersion_threshold <= 0.0 {
            return Err(ValidatorError::configuration(
                "multivariate.overdispersion_threshold must be positive",
            ));
        }
        Ok(())
    }
}

fn open_unit(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ValidatorError::configuration(format!(
            "{name} must be in (0, 1), got {value}"
        )))
    }
}
