//! Feature encoding for the regression models.
//!
//! Column order is fixed: `const`, the meta-signal indicators, numeric
//! controls in configured order, then one-hot columns for each categorical
//! control. For a categorical control the lexicographically first category
//! is the reference level and gets no column; the others are named
//! `<control>_<category>`.

use crate::labels::LabelledDataset;
use nalgebra::{DMatrix, DVector};
use orderflow_validator_core::{Result, ValidatorError};
use orderflow_validator_data::models::observation::distinct;

/// Singular values below this are treated as zero.
pub const RANK_TOLERANCE: f64 = 1e-10;

pub const INTERCEPT: &str = "const";

/// Dense design matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub matrix: DMatrix<f64>,
}

impl DesignMatrix {
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Builds a matrix from named columns of equal length.
    ///
    /// # Errors
    /// Returns `ValidatorError::Numerical` when the columns are ragged or
    /// empty.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let nrows = columns.first().map_or(0, |(_, v)| v.len());
        if columns.is_empty() || nrows == 0 {
            return Err(ValidatorError::numerical("design matrix has no rows"));
        }
        if let Some((name, _)) = columns.iter().find(|(_, v)| v.len() != nrows) {
            return Err(ValidatorError::numerical(format!(
                "design column '{name}' has the wrong length"
            )));
        }
        let matrix = DMatrix::from_fn(nrows, columns.len(), |r, c| columns[c].1[r]);
        Ok(Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            matrix,
        })
    }
}

/// One categorical control expanded into indicator columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotEncoding {
    pub reference: String,
    /// Encoded (non-reference) categories, ascending.
    pub levels: Vec<String>,
}

/// Sorted categories with the first dropped as reference.
#[must_use]
pub fn one_hot_levels(values: &[String]) -> Option<OneHotEncoding> {
    let mut categories = distinct(values).into_iter();
    let reference = categories.next()?;
    Some(OneHotEncoding {
        reference,
        levels: categories.collect(),
    })
}

/// Builds the design matrix over every row of `data`.
///
/// # Errors
/// Returns `ValidatorError::Configuration` for a missing control column or
/// unknown meta-signal.
pub fn build_design(
    data: &LabelledDataset,
    meta_signals: &[String],
    controls: &[String],
) -> Result<DesignMatrix> {
    let n = data.len();
    let mut columns: Vec<(String, Vec<f64>)> = vec![(INTERCEPT.to_string(), vec![1.0; n])];

    for meta in meta_signals {
        let flags = data.meta_signal(meta)?;
        columns.push((meta.clone(), indicator(flags.iter().copied())));
    }

    let mut categorical = Vec::new();
    for control in controls {
        if let Some(values) = data.table.numeric(control) {
            columns.push((control.clone(), values.to_vec()));
        } else if let Some(values) = data.table.categorical(control) {
            categorical.push((control, values));
        } else {
            return Err(ValidatorError::missing_column(control));
        }
    }

    for (control, values) in categorical {
        let Some(encoding) = one_hot_levels(values) else {
            continue;
        };
        for level in &encoding.levels {
            columns.push((
                format!("{control}_{level}"),
                indicator(values.iter().map(|v| v == level)),
            ));
        }
    }

    DesignMatrix::from_columns(columns)
}

fn indicator(flags: impl Iterator<Item = bool>) -> Vec<f64> {
    flags.map(|f| if f { 1.0 } else { 0.0 }).collect()
}

/// Moore–Penrose pseudo-inverse via SVD.
///
/// # Errors
/// Returns `ValidatorError::Numerical` if the decomposition fails.
pub fn pinv(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    matrix
        .clone()
        .pseudo_inverse(RANK_TOLERANCE)
        .map_err(|e| ValidatorError::numerical(format!("pseudo-inverse failed: {e}")))
}

/// `Xᵀ diag(w) X` without building the n × n diagonal.
#[must_use]
pub fn weighted_gram(x: &DMatrix<f64>, w: &DVector<f64>) -> DMatrix<f64> {
    x.transpose() * scale_rows(x, w)
}

/// Multiplies row `r` of `x` by `w[r]`.
#[must_use]
pub fn scale_rows(x: &DMatrix<f64>, w: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| x[(r, c)] * w[r])
}

/// Numerical rank via singular values.
#[must_use]
pub fn matrix_rank(matrix: &DMatrix<f64>) -> usize {
    if matrix.is_empty() {
        return 0;
    }
    let svd = matrix.clone().svd(false, false);
    let largest = svd.singular_values.max();
    let tol = largest * matrix.nrows().max(matrix.ncols()) as f64 * f64::EPSILON;
    svd.singular_values.iter().filter(|&&s| s > tol).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_validator_core::LabelConfig;
    use orderflow_validator_data::{ObservationRow, ObservationTable};

    fn dataset() -> LabelledDataset {
        let sessions = ["us", "asia", "eu", "asia"];
        let states = ["TRENDING", "BALANCED", "TRANSITIONAL", "BALANCED"];
        let rows = (0..4)
            .map(|i| {
                ObservationRow::new("S", states[i], sessions[i])
                    .with_numeric("return", 0.1 * i as f64)
                    .with_numeric("vol_pctl", 0.2 * i as f64)
                    .with_numeric("cvd_z", 1.0 - i as f64)
                    .with_numeric("spread_bps", 1.0 + i as f64)
            })
            .collect();
        let table = ObservationTable::from_rows(rows).unwrap();
        LabelledDataset::build(
            table,
            &LabelConfig {
                horizon: 1,
                ..LabelConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn column_order_and_reference_levels() {
        let data = dataset();
        let design = build_design(
            &data,
            &["U1".to_string(), "U2".to_string()],
            &[
                "session_id".to_string(),
                "spread_bps".to_string(),
                "state_tag".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(
            design.columns,
            vec![
                "const",
                "U1",
                "U2",
                "spread_bps",
                "session_id_eu",
                "session_id_us",
                "state_tag_TRANSITIONAL",
                "state_tag_TRENDING",
            ]
        );
        assert_eq!(design.nrows(), 4);
        let us = design.column_index("session_id_us").unwrap();
        assert_eq!(design.matrix[(0, us)], 1.0);
        assert_eq!(design.matrix[(1, us)], 0.0);
        assert_eq!(design.matrix[(2, 0)], 1.0);
    }

    #[test]
    fn missing_control_is_configuration_error() {
        let err = build_design(&dataset(), &[], &["ls_norm".to_string()]).unwrap_err();
        assert!(matches!(err, ValidatorError::Configuration(_)));
    }

    #[test]
    fn one_hot_drops_first_sorted_category() {
        let values: Vec<String> = ["us", "asia", "eu"].iter().map(|s| s.to_string()).collect();
        let encoding = one_hot_levels(&values).unwrap();
        assert_eq!(encoding.reference, "asia");
        assert_eq!(encoding.levels, vec!["eu", "us"]);
        assert!(one_hot_levels(&[]).is_none());
    }

    #[test]
    fn rank_detects_collinearity() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 1.0, 4.0, 5.0, 1.0, 6.0, 7.0]);
        // third column = first + second
        assert_eq!(matrix_rank(&m), 2);
        assert_eq!(matrix_rank(&DMatrix::<f64>::identity(4, 4)), 4);
    }

    #[test]
    fn weighted_gram_matches_dense_diagonal() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.5, 1.0, -1.0, 1.0, 2.0, 1.0, 3.0]);
        let w = DVector::from_vec(vec![0.5, 2.0, 1.0, 4.0]);
        let dense = x.transpose() * DMatrix::from_diagonal(&w) * &x;
        let gram = weighted_gram(&x, &w);
        assert!((gram - dense).abs().max() < 1e-12);
    }

    #[test]
    fn weighted_gram_scales_with_rows_not_square() {
        // 20 000 rows would need a 3.2 GB diagonal if materialised
        let n = 20_000;
        let x = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { (r % 10) as f64 });
        let w = DVector::from_element(n, 0.5);
        let gram = weighted_gram(&x, &w);
        assert_eq!(gram.shape(), (2, 2));
        assert!((gram[(0, 0)] - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn pinv_of_invertible_is_inverse() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let product = &m * pinv(&m).unwrap();
        assert!((product - DMatrix::<f64>::identity(2, 2)).abs().max() < 1e-9);
    }
}
