//! Run configuration for a two-group moderated differential-expression analysis.

use crate::error::{DiffExpError, Result};

/// Key used to order the reported genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortBy {
    /// Ascending raw p-value
    #[default]
    PValue,
    /// Descending absolute log-fold-change
    AbsLogFoldChange,
    /// Descending absolute t-statistic
    AbsTStatistic,
    /// Input gene order
    None,
}

/// Multiple-testing adjustment applied to the raw p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustMethod {
    #[default]
    BenjaminiHochberg,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffExpConfig {
    /// Baseline category, encoded as 0 in the group-indicator column
    pub reference: String,
    /// Effect category, encoded as 1 in the group-indicator column
    pub effect: String,
    /// Minimum number of samples required in each category (at least 2)
    pub min_samples_per_group: usize,
    /// Number of records to report; `None` reports every tested gene
    pub top_k: Option<usize>,
    pub sort_by: SortBy,
    pub adjust_method: AdjustMethod,
    /// Empirical-Bayes variance moderation; `false` gives ordinary per-gene t-tests
    pub moderate: bool,
    /// Lower bound applied to the estimated prior degrees of freedom
    pub prior_df_floor: f64,
    /// Coverage of the log-fold-change confidence interval
    pub confidence_level: f64,
    /// Only report genes whose adjusted p-value is at or below this value
    pub adjusted_p_cutoff: Option<f64>,
    /// Only report genes whose absolute log-fold-change is at or above this value
    pub lfc_threshold: f64,
    /// Size of a dedicated worker pool; `None` uses the global rayon pool
    pub n_threads: Option<usize>,
}

impl DiffExpConfig {
    pub fn new(reference: impl Into<String>, effect: impl Into<String>) -> Self {
        DiffExpConfig {
            reference: reference.into(),
            effect: effect.into(),
            min_samples_per_group: 2,
            top_k: None,
            sort_by: SortBy::default(),
            adjust_method: AdjustMethod::default(),
            moderate: true,
            prior_df_floor: 0.0,
            confidence_level: 0.95,
            adjusted_p_cutoff: None,
            lfc_threshold: 0.0,
            n_threads: None,
        }
    }

    pub fn with_min_samples_per_group(mut self, min_samples: usize) -> Self {
        self.min_samples_per_group = min_samples;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_moderation(mut self, moderate: bool) -> Self {
        self.moderate = moderate;
        self
    }

    pub fn with_prior_df_floor(mut self, floor: f64) -> Self {
        self.prior_df_floor = floor;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_adjusted_p_cutoff(mut self, cutoff: f64) -> Self {
        self.adjusted_p_cutoff = Some(cutoff);
        self
    }

    pub fn with_lfc_threshold(mut self, threshold: f64) -> Self {
        self.lfc_threshold = threshold;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }

    /// Check the configuration before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if self.reference.is_empty() || self.effect.is_empty() {
            return Err(DiffExpError::configuration(
                "reference and effect categories must be non-empty",
            ));
        }
        if self.reference == self.effect {
            return Err(DiffExpError::configuration(format!(
                "reference and effect categories are both '{}'",
                self.reference
            )));
        }
        if self.min_samples_per_group < 2 {
            return Err(DiffExpError::configuration(format!(
                "min_samples_per_group must be at least 2, got {}",
                self.min_samples_per_group
            )));
        }
        if !(self.prior_df_floor >= 0.0) {
            return Err(DiffExpError::configuration(format!(
                "prior_df_floor must be non-negative, got {}",
                self.prior_df_floor
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(DiffExpError::configuration(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if let Some(cutoff) = self.adjusted_p_cutoff {
            if !(cutoff > 0.0 && cutoff <= 1.0) {
                return Err(DiffExpError::configuration(format!(
                    "adjusted_p_cutoff must lie in (0, 1], got {}",
                    cutoff
                )));
            }
        }
        if !(self.lfc_threshold >= 0.0) {
            return Err(DiffExpError::configuration(format!(
                "lfc_threshold must be non-negative, got {}",
                self.lfc_threshold
            )));
        }
        if self.n_threads == Some(0) {
            return Err(DiffExpError::configuration("n_threads must be positive"));
        }
        Ok(())
    }
}
