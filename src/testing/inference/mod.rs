use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2};
use num_traits::ToPrimitive;
use single_utilities::traits::FloatOpsTS;

use crate::config::{AdjustMethod, DiffExpConfig};
use crate::error::{DiffExpError, Result};
use crate::testing::design::{GROUP_COLUMN, build_design};
use crate::testing::moderation::fit_variance_prior;
use crate::testing::report::rank_records;
use crate::testing::utils::{GroupLabels, default_gene_ids};
use crate::testing::{DiffExpResults, ExcludedGene, ExclusionReason, ResultRecord, correction};

pub mod linear;

pub mod parametric;

/// Two-group moderated differential expression on a genes × samples matrix.
pub trait MatrixModeratedTests<T>
where
    T: FloatOpsTS,
{
    /// Rank every gene (row) by its moderated t-test between the configured
    /// reference and effect categories of `labels` (one label per column).
    ///
    /// Failures carry a [`DiffExpError`], recoverable with
    /// `err.downcast_ref::<DiffExpError>()`.
    fn moderated_differential_expression<S: AsRef<str>>(
        &self,
        labels: &[S],
        gene_ids: Option<&[String]>,
        config: &DiffExpConfig,
    ) -> anyhow::Result<DiffExpResults>;
}

impl<T> MatrixModeratedTests<T> for Array2<T>
where
    T: FloatOpsTS,
{
    fn moderated_differential_expression<S: AsRef<str>>(
        &self,
        labels: &[S],
        gene_ids: Option<&[String]>,
        config: &DiffExpConfig,
    ) -> anyhow::Result<DiffExpResults> {
        let expression = self.mapv(|v| to_f64_or_nan(&v));
        let labels = GroupLabels::new(labels);
        Ok(differential_expression(
            expression.view(),
            &labels,
            gene_ids,
            config,
        )?)
    }
}

impl<T> MatrixModeratedTests<T> for CsrMatrix<T>
where
    T: FloatOpsTS,
{
    fn moderated_differential_expression<S: AsRef<str>>(
        &self,
        labels: &[S],
        gene_ids: Option<&[String]>,
        config: &DiffExpConfig,
    ) -> anyhow::Result<DiffExpResults> {
        let mut expression = Array2::<f64>::zeros((self.nrows(), self.ncols()));
        for (row, col, value) in self.triplet_iter() {
            expression[[row, col]] = to_f64_or_nan(value);
        }
        let labels = GroupLabels::new(labels);
        Ok(differential_expression(
            expression.view(),
            &labels,
            gene_ids,
            config,
        )?)
    }
}

/// Values that cannot be represented as `f64` become NaN, which excludes the gene.
fn to_f64_or_nan<T: ToPrimitive>(value: &T) -> f64 {
    ToPrimitive::to_f64(value).unwrap_or(f64::NAN)
}

/// Run the full pipeline: design, per-gene fits, variance prior, moderated
/// t-tests, Benjamini-Hochberg correction and ranking.
///
/// With `config.n_threads` set, the whole run executes inside a dedicated
/// rayon pool of that size.
pub fn differential_expression(
    expression: ArrayView2<f64>,
    labels: &GroupLabels,
    gene_ids: Option<&[String]>,
    config: &DiffExpConfig,
) -> Result<DiffExpResults> {
    config.validate()?;

    match config.n_threads {
        Some(n_threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .map_err(|e| {
                    DiffExpError::configuration(format!("failed to build thread pool: {}", e))
                })?;
            pool.install(|| run_pipeline(expression, labels, gene_ids, config))
        }
        None => run_pipeline(expression, labels, gene_ids, config),
    }
}

fn run_pipeline(
    expression: ArrayView2<f64>,
    labels: &GroupLabels,
    gene_ids: Option<&[String]>,
    config: &DiffExpConfig,
) -> Result<DiffExpResults> {
    let (n_genes, n_samples) = expression.dim();
    if n_genes == 0 {
        return Err(DiffExpError::empty("expression matrix has no genes"));
    }
    if n_samples == 0 {
        return Err(DiffExpError::empty("expression matrix has no samples"));
    }
    if labels.len() != n_samples {
        return Err(DiffExpError::configuration(format!(
            "{} sample labels for {} expression columns",
            labels.len(),
            n_samples
        )));
    }

    let gene_ids = match gene_ids {
        Some(ids) if ids.len() != n_genes => {
            return Err(DiffExpError::configuration(format!(
                "{} gene identifiers for {} expression rows",
                ids.len(),
                n_genes
            )));
        }
        Some(ids) => ids.to_vec(),
        None => default_gene_ids(n_genes),
    };

    let design = build_design(
        labels,
        &config.reference,
        &config.effect,
        config.min_samples_per_group,
    )?;
    let fit = linear::lm_fit(expression, &design)?;

    let mut excluded: Vec<(usize, ExclusionReason)> = fit.excluded.clone();
    if fit.genes.is_empty() {
        return Err(DiffExpError::empty(format!(
            "all {} genes were excluded before testing",
            n_genes
        )));
    }

    let prior = if config.moderate {
        let variances: Vec<f64> = fit.genes.iter().map(|g| g.residual_variance()).collect();
        let df: Vec<f64> = fit.genes.iter().map(|g| g.df_residual).collect();
        Some(fit_variance_prior(&variances, &df, config.prior_df_floor)?)
    } else {
        None
    };

    let tested = parametric::moderated_t_test(
        &fit,
        prior.as_ref(),
        GROUP_COLUMN,
        config.confidence_level,
    )?;
    excluded.extend(tested.excluded.iter().copied());
    if tested.stats.is_empty() {
        return Err(DiffExpError::empty(format!(
            "none of the {} genes had a usable variance estimate",
            n_genes
        )));
    }

    let p_values: Vec<f64> = tested.stats.iter().map(|s| s.p_value).collect();
    let adjusted = match config.adjust_method {
        AdjustMethod::BenjaminiHochberg => correction::benjamini_hochberg_correction(&p_values)?,
    };

    let records: Vec<ResultRecord> = tested
        .stats
        .iter()
        .zip(adjusted)
        .map(|(stat, adjusted_p_value)| ResultRecord {
            gene_id: gene_ids[stat.gene_index].clone(),
            gene_index: stat.gene_index,
            log_fold_change: stat.log_fold_change,
            average_expression: stat.average_expression,
            standard_error: stat.standard_error,
            t_statistic: stat.t_statistic,
            degrees_of_freedom: stat.df_total,
            p_value: stat.p_value,
            adjusted_p_value,
            confidence_interval: stat.confidence_interval,
            rank: 0,
        })
        .collect();
    let n_tested = records.len();
    let n_significant = records.iter().filter(|r| r.is_significant(0.05)).count();
    let records = rank_records(records, config);

    excluded.sort_by_key(|&(gene_index, _)| gene_index);
    let excluded: Vec<ExcludedGene> = excluded
        .into_iter()
        .map(|(gene_index, reason)| ExcludedGene {
            gene_index,
            gene_id: gene_ids[gene_index].clone(),
            reason,
        })
        .collect();

    log::info!(
        "Tested {} of {} genes ({} excluded), {} significant at FDR 0.05",
        n_tested,
        n_genes,
        excluded.len(),
        n_significant
    );

    Ok(DiffExpResults {
        records,
        excluded,
        prior,
        coefficient: design.coef_names()[GROUP_COLUMN].clone(),
        n_genes,
        n_tested,
        n_significant,
        n_reference: design.n_reference(),
        n_effect: design.n_effect(),
    })
}
