//! Error types for the moderated differential-expression pipeline.

use thiserror::Error;

/// Failure kinds raised by the pipeline stages.
///
/// Each variant is produced at the first stage that observes the violated
/// precondition, so a degenerate design can always be told apart from a
/// numerical failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiffExpError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error(
        "Rank deficient model: rank {rank} with {n_samples} samples leaves {df_residual} residual degrees of freedom"
    )]
    RankDeficiency {
        rank: usize,
        n_samples: usize,
        df_residual: isize,
    },

    #[error("Empty input: {reason}")]
    EmptyInput { reason: String },

    #[error("Numerical instability in {operation}: {details}")]
    NumericalInstability { operation: String, details: String },
}

impl DiffExpError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        DiffExpError::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(reason: impl Into<String>) -> Self {
        DiffExpError::EmptyInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn numerical(operation: &str, details: impl Into<String>) -> Self {
        DiffExpError::NumericalInstability {
            operation: operation.to_string(),
            details: details.into(),
        }
    }
}

/// Result type alias for pipeline stages
pub type Result<T> = std::result::Result<T, DiffExpError>;
