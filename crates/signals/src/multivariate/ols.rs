use super::design::{matrix_rank, pinv, DesignMatrix};
use super::{Coefficient, RegressionSummary};
use nalgebra::DVector;
use orderflow_validator_core::stats::{student_t_ppf, student_t_two_sided};
use orderflow_validator_core::{Result, ValidatorError};

/// Ordinary least squares with classical standard errors.
///
/// # Errors
/// Returns `ValidatorError::Numerical` if the response length does not match
/// the design or the pseudo-inverse fails.
pub fn fit_ols(design: &DesignMatrix, y: &[f64]) -> Result<RegressionSummary> {
    let x = &design.matrix;
    let n = x.nrows();
    if y.len() != n {
        return Err(ValidatorError::numerical(format!(
            "OLS response has {} rows, design has {n}",
            y.len()
        )));
    }
    let y = DVector::from_column_slice(y);

    let params = pinv(x)? * &y;
    let resid = &y - x * &params;
    let ssr = resid.norm_squared();
    let df_resid = (n - matrix_rank(x)) as f64;
    let scale = if df_resid > 0.0 { ssr / df_resid } else { f64::NAN };
    let cov = pinv(&(x.transpose() * x))? * scale;
    let t_crit = student_t_ppf(0.975, df_resid);

    let coefficients = design
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let coef = params[i];
            let se = cov[(i, i)].max(0.0).sqrt();
            let statistic = if se > 0.0 { coef / se } else { f64::NAN };
            Coefficient {
                variable: name.clone(),
                coef,
                std_err: se,
                statistic,
                p_value: if statistic.is_nan() {
                    f64::NAN
                } else {
                    student_t_two_sided(statistic, df_resid)
                },
                ci_lower: coef - t_crit * se,
                ci_upper: coef + t_crit * se,
            }
        })
        .collect();

    Ok(RegressionSummary {
        model: "ols".to_string(),
        coefficients,
        dispersion: None,
        nobs: n,
        df_resid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_is_recovered() {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let noise = [0.01, -0.01];
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, xi)| 1.5 + 2.0 * xi + noise[i % 2])
            .collect();
        let design = DesignMatrix::from_columns(vec![
            ("const".to_string(), vec![1.0; 20]),
            ("x".to_string(), x),
        ])
        .unwrap();

        let summary = fit_ols(&design, &y).unwrap();
        assert_eq!(summary.model, "ols");
        assert!((summary.coef("const").unwrap() - 1.5).abs() < 0.02);
        assert!((summary.coef("x").unwrap() - 2.0).abs() < 1e-3);
        assert!((summary.df_resid - 18.0).abs() < f64::EPSILON);
        let slope = &summary.coefficients[1];
        assert!(slope.p_value < 1e-10);
        assert!(slope.ci_lower < 2.0 && slope.ci_upper > 2.0);
    }

    #[test]
    fn collinear_column_reduces_df() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let doubled: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        let y: Vec<f64> = x.iter().map(|v| v + (v * 0.7).sin()).collect();
        let design = DesignMatrix::from_columns(vec![
            ("const".to_string(), vec![1.0; 10]),
            ("x".to_string(), x),
            ("x2".to_string(), doubled),
        ])
        .unwrap();
        let summary = fit_ols(&design, &y).unwrap();
        assert!((summary.df_resid - 8.0).abs() < f64::EPSILON);
    }
}
