//! Count regression: Poisson GLM with a negative-binomial refit on
//! overdispersion.
//!
//! Both families use the log link and are fit by iteratively reweighted
//! least squares. The NB shape `alpha` is fixed from the Poisson dispersion,
//! not estimated jointly.

use super::design::{matrix_rank, pinv, scale_rows, weighted_gram, DesignMatrix};
use super::{Coefficient, RegressionSummary};
use nalgebra::{DMatrix, DVector};
use orderflow_validator_core::stats::{normal_two_sided, standard_normal_ppf};
use orderflow_validator_core::{Result, ValidatorError};

/// Linear predictor bound that keeps `exp(eta)` finite.
const MAX_ETA: f64 = 700.0;
/// Floor for the starting mean of an all-zero response.
const MIN_MU: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountFamily {
    Poisson,
    NegativeBinomial { alpha: f64 },
}

impl CountFamily {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Poisson => "poisson",
            Self::NegativeBinomial { .. } => "negative_binomial",
        }
    }

    /// IRLS weight for the log link.
    fn weight(&self, mu: f64) -> f64 {
        match self {
            Self::Poisson => mu,
            Self::NegativeBinomial { alpha } => mu / (1.0 + alpha * mu),
        }
    }

    /// Unit deviance contribution.
    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        let ylogy = if y > 0.0 { y * (y / mu).ln() } else { 0.0 };
        match self {
            Self::Poisson => 2.0 * (ylogy - (y - mu)),
            Self::NegativeBinomial { alpha } => {
                let inv = 1.0 / alpha;
                2.0 * (ylogy - (y + inv) * ((1.0 + alpha * y) / (1.0 + alpha * mu)).ln())
            }
        }
    }
}

/// Converged IRLS fit.
#[derive(Debug, Clone)]
pub struct GlmFit {
    pub family: CountFamily,
    pub params: DVector<f64>,
    pub std_errors: DVector<f64>,
    pub deviance: f64,
    pub df_resid: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl GlmFit {
    /// Deviance per residual degree of freedom, `None` without residual df.
    #[must_use]
    pub fn dispersion(&self) -> Option<f64> {
        (self.df_resid > 0.0).then(|| self.deviance / self.df_resid)
    }
}

/// Fits a log-link GLM by IRLS.
///
/// # Errors
/// Returns `ValidatorError::Numerical` if the design and response disagree
/// in length or a solve fails.
pub fn fit_glm(
    design: &DesignMatrix,
    y: &[f64],
    family: CountFamily,
    max_iter: usize,
    tolerance: f64,
) -> Result<GlmFit> {
    let x = &design.matrix;
    let n = x.nrows();
    if y.len() != n || n == 0 {
        return Err(ValidatorError::numerical(format!(
            "GLM response has {} rows, design has {n}",
            y.len()
        )));
    }
    let y = DVector::from_column_slice(y);
    let y_mean = y.mean();

    let mut mu = y.map(|v| ((v + y_mean) / 2.0).max(MIN_MU));
    let mut eta = mu.map(f64::ln);
    let mut params = DVector::zeros(x.ncols());
    let mut deviance = total_deviance(family, &y, &mu);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < max_iter {
        iterations += 1;
        let w = mu.map(|m| family.weight(m));
        let z = DVector::from_fn(n, |i, _| eta[i] + (y[i] - mu[i]) / mu[i]);
        params = weighted_solve(x, &w, &z)?;

        eta = (x * &params).map(|e| e.clamp(-MAX_ETA, MAX_ETA));
        mu = eta.map(f64::exp);

        let previous = deviance;
        deviance = total_deviance(family, &y, &mu);
        if (deviance - previous).abs() <= tolerance {
            converged = true;
            break;
        }
    }

    let w = mu.map(|m| family.weight(m));
    let xtwx = weighted_gram(x, &w);
    let cov = pinv(&xtwx)?;
    let std_errors = cov.diagonal().map(|v| v.max(0.0).sqrt());
    let df_resid = (n - matrix_rank(x)) as f64;

    if !converged {
        tracing::warn!(family = family.name(), iterations, "GLM did not converge");
    }

    Ok(GlmFit {
        family,
        params,
        std_errors,
        deviance,
        df_resid,
        iterations,
        converged,
    })
}

fn weighted_solve(x: &DMatrix<f64>, w: &DVector<f64>, z: &DVector<f64>) -> Result<DVector<f64>> {
    let sqrt_w = w.map(f64::sqrt);
    let xw = scale_rows(x, &sqrt_w);
    let zw = z.component_mul(&sqrt_w);
    Ok(pinv(&xw)? * zw)
}

fn total_deviance(family: CountFamily, y: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| family.unit_deviance(yi, mi))
        .sum()
}

/// Fits Poisson and switches to negative binomial when
/// `deviance / df_resid > overdispersion_threshold`, with
/// `alpha = max(dispersion - 1, 1e-6)`. The reported dispersion is always
/// the Poisson one.
///
/// # Errors
/// See [`fit_glm`].
pub fn fit_count_model(
    design: &DesignMatrix,
    counts: &[f64],
    overdispersion_threshold: f64,
    max_iter: usize,
    tolerance: f64,
) -> Result<RegressionSummary> {
    let poisson = fit_glm(design, counts, CountFamily::Poisson, max_iter, tolerance)?;
    let dispersion = poisson.dispersion();

    let fit = match dispersion {
        Some(d) if d > overdispersion_threshold => {
            let alpha = (d - 1.0).max(1e-6);
            tracing::info!(dispersion = d, alpha, "Overdispersion detected, refitting negative binomial");
            fit_glm(
                design,
                counts,
                CountFamily::NegativeBinomial { alpha },
                max_iter,
                tolerance,
            )?
        }
        _ => poisson,
    };

    Ok(summarise(design, &fit, dispersion))
}

fn summarise(design: &DesignMatrix, fit: &GlmFit, dispersion: Option<f64>) -> RegressionSummary {
    let z_crit = standard_normal_ppf(0.975);
    let coefficients = design
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let coef = fit.params[i];
            let se = fit.std_errors[i];
            let statistic = if se > 0.0 { coef / se } else { f64::NAN };
            Coefficient {
                variable: name.clone(),
                coef,
                std_err: se,
                statistic,
                p_value: if statistic.is_nan() {
                    f64::NAN
                } else {
                    normal_two_sided(statistic)
                },
                ci_lower: coef - z_crit * se,
                ci_upper: coef + z_crit * se,
            }
        })
        .collect();

    RegressionSummary {
        model: fit.family.name().to_string(),
        coefficients,
        dispersion,
        nobs: design.nrows(),
        df_resid: fit.df_resid,
    }
}
