//! Moderated and ordinary t-statistics for a single design coefficient.
//!
//! Every gene shares the design-derived scale factor `sqrt((XᵗX)⁻¹_jj)` and, when
//! moderation is on, the same [`VariancePrior`]; both are read-only inside the
//! parallel per-gene loop.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::error::{DiffExpError, Result};
use crate::testing::effect::log_fold_change_confidence_interval;
use crate::testing::inference::linear::LinearModelFit;
use crate::testing::moderation::{VariancePrior, squeeze_variances};
use crate::testing::{ExclusionReason, ModeratedStat};

/// Above this many degrees of freedom the t distribution is replaced by the standard normal.
pub const NORMAL_APPROX_DF: f64 = 1e4;

/// Per-gene statistics plus the genes that could not be tested.
#[derive(Debug, Clone)]
pub struct TestedGenes {
    pub stats: Vec<ModeratedStat>,
    pub excluded: Vec<(usize, ExclusionReason)>,
}

/// Compute t-statistics for coefficient `coef` of every fitted gene.
///
/// With `prior = Some(..)` each gene's variance is replaced by its posterior
/// (shrunk) variance and the degrees of freedom become `d0 + df_resid`, capped
/// at the pooled residual df and floored at 1. With `prior = None` these are
/// ordinary per-gene t-tests on `df_resid` degrees of freedom. Genes left with
/// no positive finite variance are excluded instead of producing NaN/Inf.
pub fn moderated_t_test(
    fit: &LinearModelFit,
    prior: Option<&VariancePrior>,
    coef: usize,
    confidence_level: f64,
) -> Result<TestedGenes> {
    if coef >= fit.qr.rank() {
        return Err(DiffExpError::configuration(format!(
            "coefficient {} out of range for a design with {} columns",
            coef,
            fit.qr.rank()
        )));
    }

    let unscaled_sd = fit.unscaled_sd(coef);
    if !(unscaled_sd.is_finite() && unscaled_sd > 0.0) {
        return Err(DiffExpError::numerical(
            "moderated_t_test",
            format!("invalid scale factor {} for coefficient {}", unscaled_sd, coef),
        ));
    }
    let df_pooled = fit.df_pooled();

    let sample_variances: Vec<f64> = fit.genes.iter().map(|g| g.residual_variance()).collect();
    let variances = match prior {
        Some(prior) => {
            let df_residual: Vec<f64> = fit.genes.iter().map(|g| g.df_residual).collect();
            squeeze_variances(&sample_variances, &df_residual, prior)
        }
        None => sample_variances,
    };

    let outcomes: Vec<std::result::Result<ModeratedStat, usize>> = fit
        .genes
        .par_iter()
        .zip(variances.par_iter())
        .map(|(gene, &variance)| {
            let df_total = match prior {
                Some(prior) => prior.total_df(gene.df_residual, df_pooled),
                None => gene.df_residual,
            };

            if !(variance.is_finite() && variance > 0.0) {
                return Err(gene.gene_index);
            }

            let log_fold_change = gene.coefficients[coef];
            let standard_error = variance.sqrt() * unscaled_sd;
            let t_statistic = log_fold_change / standard_error;
            Ok(ModeratedStat {
                gene_index: gene.gene_index,
                log_fold_change,
                average_expression: gene.average_expression,
                posterior_variance: variance,
                df_total,
                standard_error,
                t_statistic,
                p_value: t_test_p_value(t_statistic, df_total),
                confidence_interval: log_fold_change_confidence_interval(
                    log_fold_change,
                    standard_error,
                    df_total,
                    confidence_level,
                ),
            })
        })
        .collect();

    let mut stats = Vec::with_capacity(outcomes.len());
    let mut excluded = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(stat) => stats.push(stat),
            Err(gene_index) => excluded.push((gene_index, ExclusionReason::ZeroVariance)),
        }
    }

    if !excluded.is_empty() {
        log::warn!(
            "Excluded {} genes without a positive variance estimate",
            excluded.len()
        );
    }

    Ok(TestedGenes { stats, excluded })
}

/// Two-sided p-value `2·P(T_df > |t|)`; `df` may be non-integer.
pub fn t_test_p_value(t_stat: f64, df: f64) -> f64 {
    if t_stat.is_nan() || df.is_nan() || df <= 0.0 {
        return 1.0;
    }
    if t_stat.is_infinite() {
        return 0.0;
    }

    let abs_t = t_stat.abs();
    if abs_t == 0.0 {
        return 1.0;
    }

    let tail = if df > NORMAL_APPROX_DF {
        match Normal::new(0.0, 1.0) {
            Ok(normal) => normal.sf(abs_t),
            Err(_) => return 1.0,
        }
    } else {
        match StudentsT::new(0.0, 1.0, df) {
            Ok(t_dist) => t_dist.sf(abs_t),
            Err(_) => return 1.0,
        }
    };

    (2.0 * tail).clamp(0.0, 1.0)
}
