pub mod correction;
pub mod design;
pub mod effect;
pub mod inference;
pub mod moderation;
pub mod report;

pub mod utils;

use crate::testing::moderation::VariancePrior;

/// Why a gene was left out of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExclusionReason {
    /// The expression row holds NaN or infinite values
    NonFiniteValues,
    /// No positive finite variance was available to scale the statistic
    ZeroVariance,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExcludedGene {
    pub gene_index: usize,
    pub gene_id: String,
    pub reason: ExclusionReason,
}

/// Test outcome for one gene, before multiple-testing correction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeratedStat {
    pub gene_index: usize,
    /// Group coefficient (effect minus reference)
    pub log_fold_change: f64,
    pub average_expression: f64,
    /// Shrunk variance, or the residual variance when moderation is off
    pub posterior_variance: f64,
    /// Degrees of freedom of the reference t distribution
    pub df_total: f64,
    pub standard_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub confidence_interval: (f64, f64),
}

/// One row of the ranked result table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultRecord {
    pub gene_id: String,
    /// Row of the gene in the input matrix
    pub gene_index: usize,
    pub log_fold_change: f64,
    pub average_expression: f64,
    pub standard_error: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    /// Benjamini-Hochberg q-value
    pub adjusted_p_value: f64,
    pub confidence_interval: (f64, f64),
    /// 1-based position in the reported order
    pub rank: usize,
}

impl ResultRecord {
    /// Check if the gene is significant at the given FDR threshold
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.adjusted_p_value < alpha
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffExpResults {
    /// Reported genes in rank order
    pub records: Vec<ResultRecord>,
    /// Genes omitted from testing, ordered by input index
    pub excluded: Vec<ExcludedGene>,
    /// Fitted variance prior; `None` when moderation is off
    pub prior: Option<VariancePrior>,
    /// Name of the tested coefficient, e.g. `cancer_vs_normal`
    pub coefficient: String,
    /// Genes in the input matrix
    pub n_genes: usize,
    /// Genes that received a p-value (reported or filtered out)
    pub n_tested: usize,
    /// Tested genes with an adjusted p-value below 0.05, counted before filters and top-K
    pub n_significant: usize,
    pub n_reference: usize,
    pub n_effect: usize,
}

impl DiffExpResults {
    pub fn num_excluded(&self) -> usize {
        self.excluded.len()
    }

    /// Get input indices of reported genes significant at the given threshold
    pub fn significant_indices(&self, alpha: f64) -> Vec<usize> {
        self.records
            .iter()
            .filter_map(|r| {
                if r.is_significant(alpha) {
                    Some(r.gene_index)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Get the number of significant reported genes at the given threshold
    pub fn num_significant(&self, alpha: f64) -> usize {
        self.records.iter().filter(|r| r.is_significant(alpha)).count()
    }

    /// Significant genes split by direction: (higher in effect group, lower in effect group)
    pub fn up_down_counts(&self, alpha: f64) -> (usize, usize) {
        self.records
            .iter()
            .filter(|r| r.is_significant(alpha))
            .fold((0, 0), |(up, down), r| {
                if r.log_fold_change > 0.0 {
                    (up + 1, down)
                } else if r.log_fold_change < 0.0 {
                    (up, down + 1)
                } else {
                    (up, down)
                }
            })
    }

    /// Get input indices of the first `n` reported genes
    pub fn top_features(&self, n: usize) -> Vec<usize> {
        self.records.iter().take(n).map(|r| r.gene_index).collect()
    }

    /// Look up a reported gene by identifier
    pub fn record(&self, gene_id: &str) -> Option<&ResultRecord> {
        self.records.iter().find(|r| r.gene_id == gene_id)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    fn assert_serde<T: serde::Serialize + serde::de::DeserializeOwned>() {}

    #[test]
    fn test_result_types_are_serializable() {
        assert_serde::<ModeratedStat>();
        assert_serde::<ResultRecord>();
        assert_serde::<ExcludedGene>();
        assert_serde::<DiffExpResults>();
    }
}
