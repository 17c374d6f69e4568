use ndarray::ArrayView1;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::testing::inference::parametric::NORMAL_APPROX_DF;

/// Mean expression of one gene across all samples
pub fn average_expression(row: ArrayView1<f64>) -> f64 {
    if row.is_empty() {
        return f64::NAN;
    }
    row.sum() / row.len() as f64
}

/// Two-sided quantile `t_{1-α/2, df}` for a confidence interval of coverage `level`.
pub fn t_critical_value(level: f64, df: f64) -> f64 {
    let prob = 0.5 + level / 2.0;
    if !df.is_finite() || df > NORMAL_APPROX_DF {
        return match Normal::new(0.0, 1.0) {
            Ok(normal) => normal.inverse_cdf(prob),
            Err(_) => f64::NAN,
        };
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => t_dist.inverse_cdf(prob),
        Err(_) => f64::NAN,
    }
}

/// Confidence interval for a log-fold-change with standard error `se` on `df` degrees of freedom.
pub fn log_fold_change_confidence_interval(
    log_fold_change: f64,
    standard_error: f64,
    df: f64,
    level: f64,
) -> (f64, f64) {
    let margin = t_critical_value(level, df) * standard_error;
    (log_fold_change - margin, log_fold_change + margin)
}
