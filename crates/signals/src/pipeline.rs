//! Validator v2 orchestration.
//!
//! Stages run in a fixed order: labels, then the four independent analyses
//! (univariate screen, multivariate models, stability, triggers and costs),
//! then the decision aggregator. The analyses only read the labelled dataset,
//! so with `parallel = true` they run on scoped threads and produce the same
//! output as the sequential path.

use crate::costs::{evaluate_costs, CostRow};
use crate::decision::{build_rule_sheet, make_scene_lists, qc_summary, run_qc, QcReport, RuleRow};
use crate::labels::{complete_rows, LabelledDataset};
use crate::multivariate::{run_regressions, MultivariateResult};
use crate::report::{build_workbook, WorkbookInputs};
use crate::stability::{analyze, StabilityResult};
use crate::triggers::{build_trigger_matrix, TriggerMatrix};
use crate::univariate::{screen, UnivariateSummary};
use chrono::{NaiveDate, Utc};
use orderflow_validator_core::{CostScenario, Result, SceneUniverse, ValidatorConfig};
use orderflow_validator_data::{
    ArtifactPaths, ArtifactWriter, CheckLine, ObservationTable, RunArtifacts, SceneLists,
    SummaryReport,
};
use std::collections::BTreeMap;
use std::thread;
use tracing::info;

/// Everything one run computed, before anything is written.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data: LabelledDataset,
    pub univariate: UnivariateSummary,
    pub multivariate: MultivariateResult,
    pub stability: StabilityResult,
    pub triggers: TriggerMatrix,
    pub costs: Vec<CostRow>,
    pub lists: SceneLists,
    pub rules: Vec<RuleRow>,
    pub qc: QcReport,
    pub artifacts: RunArtifacts,
}

struct Analyses {
    univariate: Result<UnivariateSummary>,
    multivariate: Result<MultivariateResult>,
    stability: Result<StabilityResult>,
    triggers: Result<TriggerMatrix>,
    costs: Vec<CostRow>,
}

pub struct ValidatorV2 {
    config: ValidatorConfig,
    universe: SceneUniverse,
    cost_scenarios: BTreeMap<String, CostScenario>,
}

impl ValidatorV2 {
    #[must_use]
    pub fn new(
        config: ValidatorConfig,
        universe: SceneUniverse,
        cost_scenarios: BTreeMap<String, CostScenario>,
    ) -> Self {
        Self {
            config,
            universe,
            cost_scenarios,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    #[must_use]
    pub fn universe(&self) -> &SceneUniverse {
        &self.universe
    }

    /// Runs every stage over `table`.
    ///
    /// # Errors
    /// Returns the first fatal `ValidatorError`. QC failures are not errors.
    pub fn run(&self, table: ObservationTable) -> Result<PipelineOutput> {
        self.config.validate()?;
        info!(
            rows = table.len(),
            scenes = self.universe.len(),
            parallel = self.config.parallel,
            "Starting validator v2"
        );

        let data = LabelledDataset::build(table, &self.config.labels)?;
        info!(
            positives = data.labels.positives(),
            horizon = data.labels.horizon,
            "Labels built"
        );

        let analyses = if self.config.parallel {
            self.analyze_parallel(&data)
        } else {
            self.analyze_sequential(&data)
        };
        let univariate = analyses.univariate?;
        let multivariate = analyses.multivariate?;
        let stability = analyses.stability?;
        let triggers = analyses.triggers?;
        let costs = analyses.costs;

        info!(
            records = univariate.records.len(),
            passing = univariate.passing().count(),
            "Univariate screen complete"
        );

        let lists = make_scene_lists(&univariate, &self.universe);
        let rules = build_rule_sheet(&univariate, &lists);
        let qc = run_qc(&data, &stability, &self.config);
        info!(
            whitelist = lists.whitelist.len(),
            blacklist = lists.blacklist.len(),
            qc_pass = qc.is_valid(),
            "Decision complete"
        );

        let workbook = build_workbook(&WorkbookInputs {
            univariate: &univariate,
            multivariate: &multivariate,
            costs: &costs,
            rules: &rules,
            stability: &stability,
            triggers: &triggers,
        });
        let report = SummaryReport {
            generated_at: Utc::now(),
            summary: qc_summary(&data, &qc, &stability, &lists, &triggers),
            checks: qc.checks.iter().map(CheckLine::from).collect(),
            lists: lists.clone(),
        };
        let artifacts = RunArtifacts {
            workbook,
            combo_matrix: multivariate.combo_matrix.clone(),
            lists: lists.clone(),
            report,
        };

        Ok(PipelineOutput {
            data,
            univariate,
            multivariate,
            stability,
            triggers,
            costs,
            lists,
            rules,
            qc,
            artifacts,
        })
    }

    /// Writes the run's artifacts under `results_dir` and syncs the rule file.
    ///
    /// # Errors
    /// Returns an error if any artifact cannot be written.
    pub fn write(&self, output: &PipelineOutput, date: NaiveDate) -> anyhow::Result<ArtifactPaths> {
        let writer = ArtifactWriter::new(&self.config.results_dir, &self.config.rule_sync_path);
        let paths = writer.write_all(&output.artifacts, date)?;
        info!(results_dir = %self.config.results_dir.display(), "Artifacts written");
        Ok(paths)
    }

    fn analyze_sequential(&self, data: &LabelledDataset) -> Analyses {
        Analyses {
            univariate: self.run_univariate(data),
            multivariate: run_regressions(data, &self.config.multivariate),
            stability: self.run_stability(data),
            triggers: build_trigger_matrix(&data.table, &self.config.triggers),
            costs: self.run_costs(data),
        }
    }

    fn analyze_parallel(&self, data: &LabelledDataset) -> Analyses {
        thread::scope(|s| {
            let univariate = s.spawn(|| self.run_univariate(data));
            let multivariate = s.spawn(|| run_regressions(data, &self.config.multivariate));
            let stability = s.spawn(|| self.run_stability(data));
            let triggers = s.spawn(|| build_trigger_matrix(&data.table, &self.config.triggers));
            let costs = self.run_costs(data);

            Analyses {
                univariate: join(univariate),
                multivariate: join(multivariate),
                stability: join(stability),
                triggers: join(triggers),
                costs,
            }
        })
    }

    fn run_univariate(&self, data: &LabelledDataset) -> Result<UnivariateSummary> {
        screen(data, &self.config.univariate, &self.config.thresholds())
    }

    fn run_stability(&self, data: &LabelledDataset) -> Result<StabilityResult> {
        analyze(data, &self.config.stability, &self.config.univariate.meta_signals)
    }

    /// Costs are measured on rows with a complete forward window.
    fn run_costs(&self, data: &LabelledDataset) -> Vec<CostRow> {
        let forward = &data.labels.forward_return;
        let complete = complete_rows(forward.len(), data.labels.horizon).min(forward.len());
        evaluate_costs(&forward[..complete], &self.cost_scenarios)
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}
