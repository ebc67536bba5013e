pub mod costs;
pub mod decision;
pub mod labels;
pub mod multivariate;
pub mod pipeline;
pub mod report;
pub mod stability;
pub mod triggers;
pub mod univariate;

// Re-export the label builder
pub use labels::{build_labels, forward_returns, FilterThresholds, LabelArtifacts, LabelledDataset};

// Re-export analysis stages
pub use costs::{evaluate_costs, CostRow};
pub use multivariate::{
    build_design, fit_count_model, run_regressions, BreakdownRecord, Coefficient,
    CombinationSummary, DesignMatrix, MultivariateResult, RegressionSummary,
};
pub use stability::{StabilityRecord, StabilityResult};
pub use triggers::{build_trigger_matrix, TriggerMatrix, TriggerThreshold};
pub use univariate::{screen, ScreeningRecord, UnivariateSummary};

// Re-export decision and orchestration
pub use decision::{build_rule_sheet, make_scene_lists, run_qc, QcCheck, QcReport, RuleRow};
pub use orderflow_validator_data::SceneLists;
pub use pipeline::{PipelineOutput, ValidatorV2};
