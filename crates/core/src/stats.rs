//! Descriptive statistics and hypothesis-testing primitives.
//!
//! Everything here is a pure function over `f64` slices. Quantiles use linear
//! interpolation between order statistics, rolling windows are trailing and
//! right-aligned, and p-values come from `statrs` distributions.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal, StudentsT};

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with one degree of freedom removed.
#[must_use]
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation (ddof = 1).
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Population standard deviation (ddof = 0).
#[must_use]
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// Quantile with linear interpolation between the two nearest order
/// statistics (position `(n - 1) * q`).
///
/// # Examples
/// ```
/// use orderflow_validator_core::stats::quantile;
///
/// let q = quantile(&[1.0, 2.0, 3.0, 4.0], 0.5).unwrap();
/// assert!((q - 2.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, q))
}

/// Same as [`quantile`] for an already ascending, non-empty slice.
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Trailing rolling mean.
///
/// Position `i` averages `values[i + 1 - window ..= i]` (clipped at the
/// start) and is `None` while fewer than `min_periods` observations are in
/// the window.
#[must_use]
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= window {
            sum -= values[i - window];
        }
        let count = (i + 1).min(window);
        if count >= min_periods {
            out.push(Some(sum / count as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Share of positions whose rolling value exists and is at least `level`.
///
/// Undefined positions count in the denominator.
#[must_use]
pub fn share_at_or_above(rolling: &[Option<f64>], level: f64) -> f64 {
    if rolling.is_empty() {
        return 0.0;
    }
    let hits = rolling
        .iter()
        .filter(|v| v.is_some_and(|x| x >= level))
        .count();
    hits as f64 / rolling.len() as f64
}

/// Result of a two-sample Welch t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    /// t statistic (`mean_a - mean_b` over its standard error).
    pub statistic: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value in [0, 1], NaN when either sample holds a NaN.
    pub p_value: f64,
}

/// Two-sample mean-difference test with unequal variances.
///
/// Returns `None` when either sample has fewer than two observations. A zero
/// standard error yields `statistic = 0` and `p_value = 1`.
#[must_use]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<WelchTest> {
    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let var_a = sample_variance(a)?;
    let var_b = sample_variance(b)?;
    let mean_a = mean(a)?;
    let mean_b = mean(b)?;

    let se_a = var_a / n_a;
    let se_b = var_b / n_b;
    let se = (se_a + se_b).sqrt();
    if se < f64::EPSILON {
        return Some(WelchTest {
            statistic: 0.0,
            df: n_a + n_b - 2.0,
            p_value: 1.0,
        });
    }

    let statistic = (mean_a - mean_b) / se;
    let df = (se_a + se_b).powi(2) / (se_a.powi(2) / (n_a - 1.0) + se_b.powi(2) / (n_b - 1.0));
    let p_value = student_t_two_sided(statistic, df);

    Some(WelchTest {
        statistic,
        df,
        p_value,
    })
}

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
///
/// A NaN statistic has a NaN p-value.
#[must_use]
pub fn student_t_two_sided(statistic: f64, df: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic.is_infinite() {
        return 0.0;
    }
    if df <= 0.0 || !df.is_finite() {
        return normal_two_sided(statistic);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(statistic.abs()))).clamp(0.0, 1.0),
        Err(_) => normal_two_sided(statistic),
    }
}

/// Two-sided p-value of a standard-normal statistic.
#[must_use]
pub fn normal_two_sided(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic.is_infinite() {
        return 0.0;
    }
    (2.0 * (1.0 - standard_normal_cdf(statistic.abs()))).clamp(0.0, 1.0)
}

/// Standard normal CDF.
#[must_use]
pub fn standard_normal_cdf(x: f64) -> f64 {
    standard_normal().cdf(x)
}

/// Standard normal quantile function.
#[must_use]
pub fn standard_normal_ppf(p: f64) -> f64 {
    standard_normal().inverse_cdf(p)
}

/// Standard normal density.
#[must_use]
pub fn standard_normal_pdf(x: f64) -> f64 {
    standard_normal().pdf(x)
}

/// Student-t quantile used for coefficient confidence intervals.
#[must_use]
pub fn student_t_ppf(p: f64, df: f64) -> f64 {
    if df <= 0.0 || !df.is_finite() {
        return standard_normal_ppf(p);
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| dist.inverse_cdf(p))
        .unwrap_or_else(|_| standard_normal_ppf(p))
}

fn standard_normal() -> Normal {
    // mean 0 / std 1 is always a valid parameterisation
    Normal::new(0.0, 1.0).unwrap_or_else(|_| unreachable!("standard normal parameters"))
}

/// Benjamini–Hochberg adjusted p-values and rejection flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdrCorrection {
    /// Adjusted p-values, aligned with the input order.
    pub adjusted: Vec<f64>,
    /// `adjusted <= alpha`, aligned with the input order.
    pub reject: Vec<bool>,
}

/// Benjamini–Hochberg step-up correction.
///
/// `adjusted_(k) = min_{j >= k} p_(j) * m / j`, capped at 1, mapped back to
/// the input order. Ties keep their input order. NaN p-values are left out
/// of `m`, stay NaN and are never rejected.
///
/// # Examples
/// ```
/// use orderflow_validator_core::stats::benjamini_hochberg;
///
/// let fdr = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.20], 0.06);
/// assert_eq!(fdr.reject, vec![true, true, true, false]);
/// ```
#[must_use]
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> FdrCorrection {
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
    let m = order.len();

    let mut adjusted = vec![f64::NAN; p_values.len()];
    let mut running_min = 1.0_f64;
    for rank in (1..=m).rev() {
        let idx = order[rank - 1];
        let candidate = p_values[idx] * m as f64 / rank as f64;
        running_min = running_min.min(candidate);
        adjusted[idx] = running_min.min(1.0);
    }

    let reject = adjusted.iter().map(|p| *p <= alpha).collect();
    FdrCorrection { adjusted, reject }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    // ============================================
    // Descriptive statistics
    // ============================================

    #[test]
    fn mean_and_variance_basic() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values).unwrap() - 5.0).abs() < 1e-12);
        assert!((sample_variance(&values).unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert!((population_std(&values).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_return_none() {
        assert!(mean(&[]).is_none());
        assert!(sample_variance(&[1.0]).is_none());
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let values = [10.0, 0.0, 5.0, 20.0, 15.0];
        assert!((quantile(&values, 0.0).unwrap() - 0.0).abs() < 1e-12);
        assert!((quantile(&values, 1.0).unwrap() - 20.0).abs() < 1e-12);
        assert!((quantile(&values, 0.5).unwrap() - 10.0).abs() < 1e-12);
        // position 0.8 * 4 = 3.2 -> 15 + 0.2 * 5
        assert!((quantile(&values, 0.8).unwrap() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_mean_respects_min_periods() {
        let rolling = rolling_mean(&[1.0, 0.0, 1.0, 1.0, 0.0], 3, 2);
        assert_eq!(rolling[0], None);
        assert!((rolling[1].unwrap() - 0.5).abs() < 1e-12);
        assert!((rolling[2].unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((rolling[3].unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((rolling[4].unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn share_counts_undefined_positions_in_denominator() {
        let rolling = vec![None, Some(0.5), Some(0.2), Some(0.9)];
        assert!((share_at_or_above(&rolling, 0.5) - 0.5).abs() < 1e-12);
        assert!(share_at_or_above(&[], 0.5).abs() < f64::EPSILON);
    }

    // ============================================
    // Welch t-test
    // ============================================

    #[test]
    fn welch_matches_reference_values() {
        // Reference: scipy.stats.ttest_ind(a, b, equal_var=False)
        let a = [27.5, 21.0, 19.0, 23.6, 17.0, 17.9, 16.9, 20.1, 21.9, 22.6, 23.1, 19.6, 19.0, 21.7, 21.4];
        let b = [27.1, 22.0, 20.8, 23.4, 23.4, 23.5, 25.8, 22.0, 24.8, 20.2, 21.9, 22.1, 22.9, 20.5, 24.4];
        let test = welch_t_test(&a, &b).unwrap();
        assert!((test.statistic - (-2.46)).abs() < 0.01, "t was {}", test.statistic);
        assert!((test.df - 24.99).abs() < 0.05, "df was {}", test.df);
        assert!((test.p_value - 0.021).abs() < 0.002, "p was {}", test.p_value);
    }

    #[test]
    fn welch_identical_constant_samples_is_not_significant() {
        let a = [1.0; 6];
        let b = [1.0; 6];
        let test = welch_t_test(&a, &b).unwrap();
        assert!(test.statistic.abs() < f64::EPSILON);
        assert!((test.p_value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn welch_needs_two_observations_per_sample() {
        assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn welch_p_value_is_symmetric() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.5];
        let ab = welch_t_test(&a, &b).unwrap();
        let ba = welch_t_test(&b, &a).unwrap();
        assert!((ab.statistic + ba.statistic).abs() < 1e-12);
        assert!((ab.p_value - ba.p_value).abs() < 1e-12);
    }

    #[test]
    fn normal_helpers_are_consistent() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((standard_normal_ppf(0.975) - 1.959_964).abs() < 1e-4);
        assert!((normal_two_sided(1.96) - 0.05).abs() < 1e-3);
        assert!((standard_normal_pdf(0.0) - 0.398_942_28).abs() < 1e-6);
    }

    #[test]
    fn nan_statistic_has_nan_p_value() {
        assert!(student_t_two_sided(f64::NAN, 12.0).is_nan());
        assert!(normal_two_sided(f64::NAN).is_nan());
        assert!(student_t_two_sided(f64::INFINITY, 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn welch_with_nan_cell_is_not_significant() {
        let a = [1.0, 2.0, f64::NAN, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.5];
        let test = welch_t_test(&a, &b).unwrap();
        assert!(test.p_value.is_nan());
        let fdr = benjamini_hochberg(&[test.p_value], 0.5);
        assert_eq!(fdr.reject, vec![false]);
    }

    // ============================================
    // Benjamini-Hochberg
    // ============================================

    #[test]
    fn bh_skips_nan_p_values() {
        let p = [0.01, f64::NAN, 0.03];
        let fdr = benjamini_hochberg(&p, 0.05);
        // m counts the two finite p-values only
        assert!((fdr.adjusted[0] - 0.02).abs() < 1e-12);
        assert!((fdr.adjusted[2] - 0.03).abs() < 1e-12);
        assert!(fdr.adjusted[1].is_nan());
        assert_eq!(fdr.reject, vec![true, false, true]);
    }

    #[test]
    fn bh_adjusts_known_example() {
        let p = [0.01, 0.04, 0.03, 0.20];
        let fdr = benjamini_hochberg(&p, 0.05);
        // sorted: 0.01*4/1=0.04, 0.03*4/2=0.06, 0.04*4/3=0.0533, 0.20
        // step-up min from the top: 0.20, 0.0533, 0.0533, 0.04
        assert!((fdr.adjusted[0] - 0.04).abs() < 1e-12);
        assert!((fdr.adjusted[2] - 0.16 / 3.0).abs() < 1e-12);
        assert!((fdr.adjusted[1] - 0.16 / 3.0).abs() < 1e-12);
        assert!((fdr.adjusted[3] - 0.20).abs() < 1e-12);
        assert_eq!(fdr.reject, vec![true, false, false, false]);
    }

    #[test]
    fn bh_adjusted_never_below_raw_and_capped() {
        let p = [0.9, 0.5, 0.001, 0.75, 0.3];
        let fdr = benjamini_hochberg(&p, 0.1);
        for (raw, adj) in p.iter().zip(&fdr.adjusted) {
            assert!(adj >= raw);
            assert!(*adj <= 1.0);
        }
    }

    #[test]
    fn bh_preserves_order_of_raw_p_values() {
        let p = [0.04, 0.001, 0.3, 0.02, 0.02, 0.8];
        let fdr = benjamini_hochberg(&p, 0.1);
        for i in 0..p.len() {
            for j in 0..p.len() {
                if p[i] < p[j] {
                    assert!(fdr.adjusted[i] <= fdr.adjusted[j]);
                }
            }
        }
    }

    #[test]
    fn bh_empty_input() {
        let fdr = benjamini_hochberg(&[], 0.1);
        assert!(fdr.adjusted.is_empty());
        assert!(fdr.reject.is_empty());
    }

    #[test]
    fn bh_false_discovery_share_bounded_under_known_nulls() {
        // 800 true nulls (uniform p) and 200 strong effects, repeated.
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let alpha = 0.1;
        let mut fdp_sum = 0.0;
        let trials = 50;
        for _ in 0..trials {
            let mut p = Vec::with_capacity(1_000);
            for _ in 0..800 {
                p.push(rng.gen::<f64>());
            }
            for _ in 0..200 {
                p.push(rng.gen::<f64>() * 1e-4);
            }
            let fdr = benjamini_hochberg(&p, alpha);
            let rejected = fdr.reject.iter().filter(|r| **r).count();
            let false_rejections = fdr.reject[..800].iter().filter(|r| **r).count();
            if rejected > 0 {
                fdp_sum += false_rejections as f64 / rejected as f64;
            }
        }
        let mean_fdp = fdp_sum / trials as f64;
        // BH guarantees E[FDP] <= alpha * m0 / m = 0.08
        assert!(mean_fdp <= alpha * 0.8 + 0.02, "mean FDP was {mean_fdp}");
    }

    #[test]
    fn bh_all_nulls_rarely_reject() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();
        let fdr = benjamini_hochberg(&p, 0.05);
        let rejected = fdr.reject.iter().filter(|r| **r).count();
        assert!(rejected <= 5, "rejected {rejected} true nulls");
    }
}
