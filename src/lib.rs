//! # single-moderated
//!
//! Empirical-Bayes moderated t-statistics for two-group differential expression,
//! part of the single-rust ecosystem.
//!
//! Given a matrix of log-scale expression values (genes × samples) and one label per
//! sample, this crate fits a linear model per gene, pools the gene-wise residual
//! variances into a scaled inverse chi-square prior, shrinks every gene's variance
//! towards that prior and tests the group effect with a moderated t-statistic. The
//! raw p-values are corrected with the Benjamini-Hochberg procedure and the genes are
//! returned as a ranked table.
//!
//! ## Core Features
//!
//! - **Per-gene linear models**: one QR factorization of the design, reused for every gene
//! - **Variance moderation**: method-of-moments prior on `log(s²)` with infinite-df pooling
//! - **Moderated t-tests**: Student's t with combined (non-integer) degrees of freedom
//! - **Multiple Testing Correction**: Benjamini-Hochberg FDR
//! - **Dense and sparse input**: `ndarray::Array2` and `CsrMatrix` from nalgebra-sparse
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use single_moderated::{DiffExpConfig, MatrixModeratedTests};
//!
//! let expression = array![
//!     [1.0, 1.2, 5.0, 5.2],
//!     [2.0, 3.0, 2.1, 2.9],
//!     [4.0, 4.6, 4.5, 4.1],
//! ];
//! let labels = ["normal", "normal", "cancer", "cancer"];
//! let config = DiffExpConfig::new("normal", "cancer");
//!
//! let results = expression
//!     .moderated_differential_expression(&labels, None, &config)
//!     .unwrap();
//! assert_eq!(results.records[0].gene_id, "gene_0");
//! ```
//!
//! ## Module Organization
//!
//! - **[`testing`]**: design matrices, linear fits, variance moderation, t-tests,
//!   multiple testing correction and result ranking
//! - **[`config`]**: run configuration
//! - **[`error`]**: error kinds raised by the pipeline

pub mod config;
pub mod error;
pub mod testing;

pub use config::{AdjustMethod, DiffExpConfig, SortBy};
pub use error::DiffExpError;
pub use testing::inference::{MatrixModeratedTests, differential_expression};
pub use testing::moderation::VariancePrior;
pub use testing::utils::GroupLabels;
pub use testing::{DiffExpResults, ExcludedGene, ExclusionReason, ResultRecord};
