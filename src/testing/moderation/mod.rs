//! Empirical-Bayes moderation of gene-wise residual variances.
//!
//! Gene variances `s²` on `d` residual degrees of freedom are modelled as draws
//! from a scaled inverse chi-square prior with `d0` degrees of freedom and scale
//! `s0²`. The prior is fitted once, by matching the first two moments of
//! `log(s²)`, and then broadcast read-only to every gene:
//!
//! ```text
//! s̃² = (d0·s0² + d·s²) / (d0 + d)
//! ```
//!
//! Homogeneous variances drive `d0` to infinity (full pooling, `s̃² = s0²`),
//! strongly heterogeneous ones drive it towards zero (no shrinkage).

pub mod special;

use crate::error::{DiffExpError, Result};
use special::{digamma, trigamma, trigamma_inverse};

/// Variances are floored at this fraction of their median before taking logs.
const VARIANCE_OFFSET: f64 = 1e-5;

/// Scaled inverse chi-square prior on the gene-wise variances.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariancePrior {
    /// Prior degrees of freedom `d0`, possibly infinite
    pub df: f64,
    /// Prior variance `s0²`
    pub variance: f64,
}

impl VariancePrior {
    /// Posterior variance for a gene with sample variance `s2` on `df_residual` degrees of freedom.
    pub fn posterior_variance(&self, s2: f64, df_residual: f64) -> f64 {
        if self.df.is_infinite() {
            return self.variance;
        }
        let df_sum = self.df + df_residual;
        if df_sum <= 0.0 {
            return s2;
        }
        (self.df * self.variance + df_residual * s2) / df_sum
    }

    /// `d0 + df_residual`, capped at the pooled residual df and floored at 1.
    ///
    /// The cap follows limma's `eBayes`: the moderated statistic never claims
    /// more degrees of freedom than all genes' residuals hold together, so an
    /// infinite `d0` still yields a finite t distribution. The cap binds only
    /// when `d0` exceeds the residual df of the other genes combined.
    pub fn total_df(&self, df_residual: f64, df_pooled: f64) -> f64 {
        (self.df + df_residual).min(df_pooled).max(1.0)
    }
}

/// Estimate the variance prior from gene-wise variances and their residual df.
///
/// Entries with a non-finite or negative variance, or non-positive df, are
/// ignored. The estimated `d0` is clamped from below at `df_floor`.
pub fn fit_variance_prior(
    variances: &[f64],
    df_residual: &[f64],
    df_floor: f64,
) -> Result<VariancePrior> {
    if variances.len() != df_residual.len() {
        return Err(DiffExpError::configuration(format!(
            "{} variances but {} degrees of freedom",
            variances.len(),
            df_residual.len()
        )));
    }
    if variances.is_empty() {
        return Err(DiffExpError::empty("no variances to estimate a prior from"));
    }

    let usable: Vec<(f64, f64)> = variances
        .iter()
        .zip(df_residual)
        .filter(|&(&s2, &d)| s2.is_finite() && s2 >= 0.0 && d.is_finite() && d > 0.0)
        .map(|(&s2, &d)| (s2, d))
        .collect();

    if usable.is_empty() {
        return Err(DiffExpError::numerical(
            "fit_variance_prior",
            "no gene has a finite variance with positive residual df",
        ));
    }

    if usable.len() == 1 {
        log::warn!("Only one gene available, variance prior carries no shrinkage");
        return Ok(VariancePrior {
            df: df_floor,
            variance: usable[0].0,
        });
    }

    let mut median = median(usable.iter().map(|&(s2, _)| s2).collect());
    if median == 0.0 {
        log::warn!("More than half of residual variances are exactly zero, moderation is unreliable");
        median = 1.0;
    } else if usable.iter().any(|&(s2, _)| s2 == 0.0) {
        log::warn!("Zero sample variances detected, offset away from zero");
    }
    let floor = VARIANCE_OFFSET * median;

    let n = usable.len() as f64;
    let mut floored = Vec::with_capacity(usable.len());
    let mut log_adjusted = Vec::with_capacity(usable.len());
    let mut mean_trigamma = 0.0;
    for &(s2, d) in &usable {
        let x = s2.max(floor);
        floored.push(x);
        log_adjusted.push(x.ln() - digamma(d / 2.0) + (d / 2.0).ln());
        mean_trigamma += trigamma(d / 2.0);
    }
    mean_trigamma /= n;

    let e_mean = log_adjusted.iter().sum::<f64>() / n;
    let e_var = log_adjusted
        .iter()
        .map(|e| (e - e_mean) * (e - e_mean))
        .sum::<f64>()
        / (n - 1.0)
        - mean_trigamma;

    let prior = if e_var > 0.0 {
        let d0 = 2.0 * trigamma_inverse(e_var)?;
        let s0_sq = (e_mean + digamma(d0 / 2.0) - (d0 / 2.0).ln()).exp();
        VariancePrior {
            df: d0.max(df_floor),
            variance: s0_sq,
        }
    } else {
        log::warn!("Residual variances are homogeneous, pooling them completely");
        VariancePrior {
            df: f64::INFINITY,
            variance: floored.iter().sum::<f64>() / n,
        }
    };

    if !(prior.variance.is_finite() && prior.variance > 0.0) || prior.df.is_nan() {
        return Err(DiffExpError::numerical(
            "fit_variance_prior",
            format!("degenerate prior (df {}, variance {})", prior.df, prior.variance),
        ));
    }

    log::info!(
        "Variance prior: df {:.4}, variance {:.6}",
        prior.df,
        prior.variance
    );
    Ok(prior)
}

/// Posterior variances for every gene under `prior`.
pub fn squeeze_variances(variances: &[f64], df_residual: &[f64], prior: &VariancePrior) -> Vec<f64> {
    variances
        .iter()
        .zip(df_residual)
        .map(|(&s2, &d)| prior.posterior_variance(s2, d))
        .collect()
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_constant_variances_pool_fully() {
        let variances = vec![0.5; 20];
        let df = vec![4.0; 20];
        let prior = fit_variance_prior(&variances, &df, 0.0).unwrap();
        assert!(prior.df.is_infinite());
        assert_relative_eq!(prior.variance, 0.5, max_relative = 1e-12);

        let posterior = squeeze_variances(&[0.1, 2.0], &[4.0, 4.0], &prior);
        assert_relative_eq!(posterior[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(posterior[1], 0.5, max_relative = 1e-12);
    }

    #[test]
    fn test_posterior_converges_to_prior_as_df_grows() {
        let c = 0.3;
        let mut last_gap = f64::INFINITY;
        for &d0 in &[1.0, 10.0, 100.0, 1e4, 1e8] {
            let prior = VariancePrior { df: d0, variance: c };
            let gap = (prior.posterior_variance(1.7, 3.0) - c).abs();
            assert!(gap < last_gap);
            last_gap = gap;
        }
        assert!(last_gap < 1e-6);
    }

    #[test]
    fn test_posterior_lies_between_sample_and_prior() {
        let prior = VariancePrior {
            df: 4.0,
            variance: 1.0,
        };
        let low = prior.posterior_variance(0.2, 2.0);
        let high = prior.posterior_variance(5.0, 2.0);
        assert!(low > 0.2 && low < 1.0);
        assert!(high < 5.0 && high > 1.0);
        assert_abs_diff_eq!(low, (4.0 + 0.4) / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_heterogeneous_variances_give_finite_df() {
        let variances = vec![0.01, 0.5, 0.08, 3.0, 0.2, 1.1, 0.03, 0.9];
        let df = vec![2.0; variances.len()];
        let prior = fit_variance_prior(&variances, &df, 0.0).unwrap();
        assert!(prior.df.is_finite() && prior.df > 0.0);
        assert!(prior.variance > 0.01 && prior.variance < 3.0);
    }

    #[test]
    fn test_df_floor_applies() {
        let variances = vec![0.001, 10.0, 0.002, 50.0, 0.0005, 20.0];
        let df = vec![2.0; variances.len()];
        let unfloored = fit_variance_prior(&variances, &df, 0.0).unwrap();
        let floored = fit_variance_prior(&variances, &df, 50.0).unwrap();
        assert!(unfloored.df < 50.0);
        assert_abs_diff_eq!(floored.df, 50.0);
    }

    #[test]
    fn test_total_df_cap_and_floor() {
        let prior = VariancePrior {
            df: f64::INFINITY,
            variance: 1.0,
        };
        assert_abs_diff_eq!(prior.total_df(2.0, 40.0), 40.0);
        let none = VariancePrior {
            df: 0.0,
            variance: 1.0,
        };
        assert_abs_diff_eq!(none.total_df(0.5, 40.0), 1.0);
    }

    #[test]
    fn test_homogeneous_prior_uses_pooled_df() {
        let variances = vec![0.4, 0.5, 0.6, 0.45];
        let df = vec![2.0; variances.len()];
        let prior = fit_variance_prior(&variances, &df, 0.0).unwrap();
        assert!(prior.df.is_infinite());
        assert_abs_diff_eq!(prior.total_df(2.0, 8.0), 8.0);

        // a finite d0 below the pooled df is left untouched
        let finite = VariancePrior {
            df: 3.84,
            variance: 0.5,
        };
        assert_abs_diff_eq!(finite.total_df(2.0, 6.0), 5.84, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variances_do_not_break_the_fit() {
        let variances = vec![0.0, 0.4, 0.2, 0.0, 0.7, 0.3];
        let df = vec![3.0; variances.len()];
        let prior = fit_variance_prior(&variances, &df, 0.0).unwrap();
        assert!(prior.variance.is_finite() && prior.variance > 0.0);
        assert!(prior.posterior_variance(0.0, 3.0) > 0.0);
    }

    #[test]
    fn test_empty_and_mismatched_input() {
        assert!(matches!(
            fit_variance_prior(&[], &[], 0.0),
            Err(DiffExpError::EmptyInput { .. })
        ));
        assert!(matches!(
            fit_variance_prior(&[1.0], &[1.0, 2.0], 0.0),
            Err(DiffExpError::Configuration { .. })
        ));
    }
}
