//! Workbook sheet assembly.
//!
//! Turns the stage outputs into the eight sheets of the statistics workbook,
//! in a fixed order. Floats are written with full precision; missing or
//! non-finite values become empty cells.

use crate::costs::CostRow;
use crate::decision::RuleRow;
use crate::multivariate::{BreakdownRecord, MultivariateResult, RegressionSummary};
use crate::stability::StabilityResult;
use crate::triggers::TriggerMatrix;
use crate::univariate::UnivariateSummary;
use orderflow_validator_data::workbook::{float_cell, optional_cell};
use orderflow_validator_data::{Sheet, Workbook};

pub const SHEET_NAMES: [&str; 8] = [
    "univariate",
    "combinations",
    "state_breakdown",
    "cost_sensitivity",
    "rules_white_list",
    "stability",
    "regression_coefficients",
    "trigger_thresholds",
];

/// Borrowed view over everything the workbook shows.
pub struct WorkbookInputs<'a> {
    pub univariate: &'a UnivariateSummary,
    pub multivariate: &'a MultivariateResult,
    pub costs: &'a [CostRow],
    pub rules: &'a [RuleRow],
    pub stability: &'a StabilityResult,
    pub triggers: &'a TriggerMatrix,
}

#[must_use]
pub fn build_workbook(inputs: &WorkbookInputs<'_>) -> Workbook {
    let mut workbook = Workbook::new();
    workbook.add(univariate_sheet(inputs.univariate));
    workbook.add(combinations_sheet(inputs.multivariate));
    workbook.add(breakdown_sheet(&inputs.multivariate.state_breakdown));
    workbook.add(cost_sheet(inputs.costs));
    workbook.add(rules_sheet(inputs.rules));
    workbook.add(stability_sheet(inputs.stability));
    workbook.add(coefficients_sheet(&[
        &inputs.multivariate.frequency_model,
        &inputs.multivariate.strength_model,
        &inputs.multivariate.quantile_model,
    ]));
    workbook.add(trigger_sheet(inputs.triggers));
    workbook
}

fn univariate_sheet(summary: &UnivariateSummary) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[0],
        &[
            "scene",
            "filter",
            "meta_signal",
            "metric",
            "N",
            "filter_rate",
            "hit_rate",
            "uplift",
            "t_stat",
            "p_value",
            "p_adjusted",
            "reject",
            "stability",
            "passes_threshold",
            "fdr_alpha",
        ],
    );
    for r in &summary.records {
        sheet.push_row(vec![
            r.scene.clone(),
            r.filter.clone(),
            r.meta_signal.clone(),
            r.metric.clone(),
            r.n.to_string(),
            float_cell(r.filter_rate),
            float_cell(r.hit_rate),
            float_cell(r.uplift),
            float_cell(r.t_stat),
            float_cell(r.p_value),
            float_cell(r.p_adjusted),
            r.reject.to_string(),
            float_cell(r.stability),
            r.passes_threshold.to_string(),
            float_cell(r.fdr_alpha),
        ]);
    }
    sheet
}

fn combinations_sheet(result: &MultivariateResult) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[1],
        &[
            "meta_signal",
            "frequency_model",
            "frequency_coef",
            "strength_coef",
            "quantile_coef",
            "q_rate",
            "net_uplift",
        ],
    );
    for c in &result.combinations {
        sheet.push_row(vec![
            c.meta_signal.clone(),
            c.frequency_model.clone(),
            optional_cell(c.frequency_coef),
            optional_cell(c.strength_coef),
            optional_cell(c.quantile_coef),
            float_cell(c.q_rate),
            optional_cell(c.net_uplift),
        ]);
    }
    sheet
}

fn breakdown_sheet(records: &[BreakdownRecord]) -> Sheet {
    let mut sheet = Sheet::new(SHEET_NAMES[2], &["state_tag", "meta_signal", "N", "hit_rate"]);
    for r in records {
        sheet.push_row(vec![
            r.group.clone(),
            r.meta_signal.clone(),
            r.n.to_string(),
            optional_cell(r.hit_rate),
        ]);
    }
    sheet
}

fn cost_sheet(rows: &[CostRow]) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[3],
        &[
            "scenario",
            "gross",
            "net",
            "hit_rate",
            "sharpe",
            "taker_fee_bps",
            "maker_fee_bps",
            "slippage_bps",
        ],
    );
    for r in rows {
        sheet.push_row(vec![
            r.scenario.clone(),
            float_cell(r.gross),
            float_cell(r.net),
            float_cell(r.hit_rate),
            float_cell(r.sharpe),
            float_cell(r.taker_fee_bps),
            float_cell(r.maker_fee_bps),
            float_cell(r.slippage_bps),
        ]);
    }
    sheet
}

fn rules_sheet(rules: &[RuleRow]) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[4],
        &[
            "scene",
            "filter",
            "meta_signal",
            "metric",
            "N",
            "hit_rate",
            "uplift",
            "p_adjusted",
        ],
    );
    for r in rules {
        sheet.push_row(vec![
            r.scene.clone(),
            r.filter.clone(),
            r.meta_signal.clone(),
            r.metric.clone(),
            r.n.to_string(),
            float_cell(r.hit_rate),
            float_cell(r.uplift),
            float_cell(r.p_adjusted),
        ]);
    }
    sheet
}

fn stability_sheet(result: &StabilityResult) -> Sheet {
    let mut sheet = Sheet::new(SHEET_NAMES[5], &["scene", "meta_signal", "N", "stability"]);
    for r in &result.records {
        sheet.push_row(vec![
            r.scene.clone(),
            r.meta_signal.clone(),
            r.n.to_string(),
            float_cell(r.stability),
        ]);
    }
    sheet
}

fn coefficients_sheet(models: &[&RegressionSummary]) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[6],
        &[
            "model",
            "variable",
            "coef",
            "std_err",
            "statistic",
            "p_value",
            "ci_lower",
            "ci_upper",
            "dispersion",
        ],
    );
    for model in models {
        for c in &model.coefficients {
            sheet.push_row(vec![
                model.model.clone(),
                c.variable.clone(),
                float_cell(c.coef),
                float_cell(c.std_err),
                float_cell(c.statistic),
                float_cell(c.p_value),
                float_cell(c.ci_lower),
                float_cell(c.ci_upper),
                optional_cell(model.dispersion),
            ]);
        }
    }
    sheet
}

fn trigger_sheet(matrix: &TriggerMatrix) -> Sheet {
    let mut sheet = Sheet::new(
        SHEET_NAMES[7],
        &["column", "quantile", "threshold", "triggered"],
    );
    for (column, threshold) in &matrix.thresholds {
        sheet.push_row(vec![
            column.clone(),
            float_cell(threshold.quantile),
            float_cell(threshold.value),
            matrix.count(column).to_string(),
        ]);
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multivariate::{CombinationSummary, Coefficient};
    use crate::stability::StabilityRecord;
    use crate::triggers::TriggerThreshold;
    use std::collections::BTreeMap;

    fn model(name: &str, dispersion: Option<f64>) -> RegressionSummary {
        RegressionSummary {
            model: name.to_string(),
            coefficients: vec![Coefficient {
                variable: "const".to_string(),
                coef: 0.5,
                std_err: 0.0,
                statistic: f64::NAN,
                p_value: f64::NAN,
                ci_lower: 0.5,
                ci_upper: 0.5,
            }],
            dispersion,
            nobs: 10,
            df_resid: 9.0,
        }
    }

    fn multivariate() -> MultivariateResult {
        MultivariateResult {
            combinations: vec![CombinationSummary {
                meta_signal: "U1".to_string(),
                frequency_model: "poisson".to_string(),
                frequency_coef: Some(0.2),
                strength_coef: None,
                quantile_coef: Some(-0.1),
                q_rate: 0.25,
                net_uplift: None,
            }],
            state_breakdown: vec![BreakdownRecord {
                group: "BALANCED".to_string(),
                meta_signal: "U1".to_string(),
                n: 0,
                hit_rate: None,
            }],
            combo_matrix: Vec::new(),
            frequency_model: model("poisson", Some(0.8)),
            strength_model: model("ols", None),
            quantile_model: model("quantile_0.50", None),
        }
    }

    #[test]
    fn workbook_has_every_sheet_in_order() {
        let univariate = UnivariateSummary {
            records: Vec::new(),
            fdr_alpha: 0.1,
        };
        let multivariate = multivariate();
        let stability = StabilityResult {
            records: vec![StabilityRecord {
                scene: "SCENE_001".to_string(),
                meta_signal: "U2".to_string(),
                stability: 0.75,
                n: 12,
            }],
            score: 0.75,
        };
        let triggers = TriggerMatrix {
            thresholds: BTreeMap::from([(
                "cvd_z".to_string(),
                TriggerThreshold {
                    quantile: 0.9,
                    value: 1.5,
                },
            )]),
            flags: BTreeMap::from([("cvd_z".to_string(), vec![true, false, true])]),
        };

        let workbook = build_workbook(&WorkbookInputs {
            univariate: &univariate,
            multivariate: &multivariate,
            costs: &[],
            rules: &[],
            stability: &stability,
            triggers: &triggers,
        });

        let names: Vec<_> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, SHEET_NAMES);
        assert!(workbook.sheet("univariate").unwrap().is_empty());
        assert_eq!(workbook.sheet("regression_coefficients").unwrap().len(), 3);
        assert_eq!(
            workbook.sheet("trigger_thresholds").unwrap().cell(0, "triggered"),
            Some("2")
        );
        assert_eq!(workbook.sheet("stability").unwrap().cell(0, "stability"), Some("0.75"));
    }

    #[test]
    fn missing_values_render_as_empty_cells() {
        let result = multivariate();
        let combos = combinations_sheet(&result);
        assert_eq!(combos.cell(0, "strength_coef"), Some(""));
        assert_eq!(combos.cell(0, "net_uplift"), Some(""));
        assert_eq!(combos.cell(0, "quantile_coef"), Some("-0.1"));

        let breakdown = breakdown_sheet(&result.state_breakdown);
        assert_eq!(breakdown.cell(0, "hit_rate"), Some(""));

        let coefs = coefficients_sheet(&[&result.frequency_model, &result.strength_model]);
        assert_eq!(coefs.cell(0, "p_value"), Some(""));
        assert_eq!(coefs.cell(0, "dispersion"), Some("0.8"));
        assert_eq!(coefs.cell(1, "dispersion"), Some(""));
    }
}
