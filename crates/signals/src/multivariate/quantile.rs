//! Linear quantile regression.
//!
//! Coefficients come from iteratively reweighted least squares on the check
//! loss. Standard errors use the robust sandwich estimator with an
//! Epanechnikov kernel density estimate at the fitted quantile and the
//! Hall–Sheather bandwidth.

use super::design::{matrix_rank, pinv, weighted_gram, DesignMatrix};
use super::{Coefficient, RegressionSummary};
use nalgebra::{DMatrix, DVector};
use orderflow_validator_core::stats::{
    population_std, quantile, standard_normal_pdf, standard_normal_ppf, student_t_ppf,
    student_t_two_sided,
};
use orderflow_validator_core::{Result, ValidatorError};

pub const MAX_ITER: usize = 1_000;
pub const PARAM_TOLERANCE: f64 = 1e-6;
/// Residuals closer to zero than this are pushed out to it.
const RESID_FLOOR: f64 = 1e-6;

/// Hall–Sheather (1988) bandwidth on the probability scale, `alpha = 0.05`.
#[must_use]
pub fn hall_sheather(nobs: usize, q: f64) -> f64 {
    let alpha = 0.05;
    let z = standard_normal_ppf(q);
    let num = 1.5 * standard_normal_pdf(z).powi(2);
    let den = 2.0 * z * z + 1.0;
    (nobs as f64).powf(-1.0 / 3.0)
        * standard_normal_ppf(1.0 - alpha / 2.0).powf(2.0 / 3.0)
        * (num / den).powf(1.0 / 3.0)
}

fn epanechnikov(u: f64) -> f64 {
    if u.abs() <= 1.0 {
        0.75 * (1.0 - u * u)
    } else {
        0.0
    }
}

/// Fits the `q`-th conditional quantile of `y`.
///
/// # Errors
/// Returns `ValidatorError::Numerical` for mismatched input, `q` outside
/// (0, 1), or a degenerate residual density.
pub fn fit_quantile(design: &DesignMatrix, y: &[f64], q: f64) -> Result<RegressionSummary> {
    if !(q > 0.0 && q < 1.0) {
        return Err(ValidatorError::numerical(format!(
            "quantile must be in (0, 1), got {q}"
        )));
    }
    let x = &design.matrix;
    let n = x.nrows();
    if y.len() != n || n == 0 {
        return Err(ValidatorError::numerical(format!(
            "quantile response has {} rows, design has {n}",
            y.len()
        )));
    }
    let yv = DVector::from_column_slice(y);
    let df_resid = (n - matrix_rank(x)) as f64;

    let mut xstar = x.clone();
    let mut beta = DVector::from_element(x.ncols(), 1.0);
    let mut diff = f64::INFINITY;
    let mut iterations = 0;

    while iterations < MAX_ITER && diff > PARAM_TOLERANCE {
        iterations += 1;
        let previous = beta.clone();
        let xtx = xstar.transpose() * x;
        let xty = xstar.transpose() * &yv;
        beta = pinv(&xtx)? * xty;

        let resid = &yv - x * &beta;
        let weights = resid.map(|r| {
            let r = if r.abs() < RESID_FLOOR {
                RESID_FLOOR.copysign(r)
            } else {
                r
            };
            let weighted = if r < 0.0 { q * r } else { (1.0 - q) * r };
            weighted.abs()
        });
        xstar = DMatrix::from_fn(n, x.ncols(), |r, c| x[(r, c)] / weights[r]);
        diff = (&beta - &previous).amax();
    }

    if diff > PARAM_TOLERANCE {
        tracing::warn!(iterations, diff, "Quantile regression hit the iteration limit");
    }

    let e: Vec<f64> = (&yv - x * &beta).iter().copied().collect();
    let iqr = match (quantile(&e, 0.75), quantile(&e, 0.25)) {
        (Some(hi), Some(lo)) => hi - lo,
        _ => 0.0,
    };
    let spread = population_std(y).unwrap_or(0.0).min(iqr / 1.34);
    let h_prob = hall_sheather(n, q);
    if q - h_prob <= 0.0 || q + h_prob >= 1.0 {
        return Err(ValidatorError::numerical(format!(
            "too few observations ({n}) for a bandwidth at quantile {q}"
        )));
    }
    let h = spread * (standard_normal_ppf(q + h_prob) - standard_normal_ppf(q - h_prob));
    if h <= 0.0 || !h.is_finite() {
        return Err(ValidatorError::numerical(
            "quantile regression residuals have no spread",
        ));
    }
    let fhat0 = e.iter().map(|&r| epanechnikov(r / h)).sum::<f64>() / (n as f64 * h);
    if fhat0 <= 0.0 {
        return Err(ValidatorError::numerical(
            "quantile regression density estimate is zero",
        ));
    }

    let d = DVector::from_iterator(
        n,
        e.iter().map(|&r| {
            if r > 0.0 {
                (q / fhat0).powi(2)
            } else {
                ((1.0 - q) / fhat0).powi(2)
            }
        }),
    );
    let xtxi = pinv(&(x.transpose() * x))?;
    let xtdx = weighted_gram(x, &d);
    let vcov = &xtxi * xtdx * &xtxi;
    let t_crit = student_t_ppf(0.975, df_resid);

    let coefficients = design
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let coef = beta[i];
            let se = vcov[(i, i)].max(0.0).sqrt();
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
        model: format!("quantile_{q:.2}"),
        coefficients,
        dispersion: None,
        nobs: n,
        df_resid,
    })
}
