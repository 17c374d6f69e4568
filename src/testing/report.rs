//! Ranking of result records and plot-ready summaries.

use std::cmp::Ordering;

use crate::config::{DiffExpConfig, SortBy};
use crate::testing::{DiffExpResults, ResultRecord};

/// Cap for −log10 of a zero adjusted p-value.
const MAX_NEG_LOG10: f64 = 300.0;

/// A point for a volcano plot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolcanoPoint {
    pub gene_index: usize,
    pub gene_id: String,
    pub log_fold_change: f64,
    /// −log10(adjusted p-value), clamped to 300
    pub neg_log10_padj: f64,
    pub significant: bool,
}

/// Sort, filter and truncate records, then assign 1-based ranks.
///
/// Ties on the sort key are broken by gene identifier and then by input
/// index, so the order is fully deterministic.
pub fn rank_records(mut records: Vec<ResultRecord>, config: &DiffExpConfig) -> Vec<ResultRecord> {
    let tie_break = |a: &ResultRecord, b: &ResultRecord| {
        a.gene_id
            .cmp(&b.gene_id)
            .then_with(|| a.gene_index.cmp(&b.gene_index))
    };

    match config.sort_by {
        SortBy::PValue => records.sort_by(|a, b| {
            a.p_value
                .partial_cmp(&b.p_value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_break(a, b))
        }),
        SortBy::AbsLogFoldChange => records.sort_by(|a, b| {
            b.log_fold_change
                .abs()
                .partial_cmp(&a.log_fold_change.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_break(a, b))
        }),
        SortBy::AbsTStatistic => records.sort_by(|a, b| {
            b.t_statistic
                .abs()
                .partial_cmp(&a.t_statistic.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_break(a, b))
        }),
        SortBy::None => records.sort_by_key(|r| r.gene_index),
    }

    records.retain(|r| {
        config
            .adjusted_p_cutoff
            .is_none_or(|cutoff| r.adjusted_p_value <= cutoff)
            && r.log_fold_change.abs() >= config.lfc_threshold
    });

    if let Some(k) = config.top_k {
        records.truncate(k);
    }

    for (i, record) in records.iter_mut().enumerate() {
        record.rank = i + 1;
    }
    records
}

/// Convert reported genes into volcano plot coordinates.
///
/// A gene is marked `significant` if `adjusted_p_value < padj_threshold` and
/// `|log_fold_change| > fc_threshold`.
pub fn volcano_points(
    results: &DiffExpResults,
    padj_threshold: f64,
    fc_threshold: f64,
) -> Vec<VolcanoPoint> {
    results
        .records
        .iter()
        .map(|r| {
            let neg_log10 = if r.adjusted_p_value > 0.0 {
                (-r.adjusted_p_value.log10()).min(MAX_NEG_LOG10)
            } else {
                MAX_NEG_LOG10
            };
            VolcanoPoint {
                gene_index: r.gene_index,
                gene_id: r.gene_id.clone(),
                log_fold_change: r.log_fold_change,
                neg_log10_padj: neg_log10,
                significant: r.adjusted_p_value < padj_threshold
                    && r.log_fold_change.abs() > fc_threshold,
            }
        })
        .collect()
}
