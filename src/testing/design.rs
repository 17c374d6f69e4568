//! Two-group treatment-contrast design matrices.
//!
//! The design has one row per sample and two columns: an intercept of ones and
//! an indicator that is 1 for samples of the effect category and 0 for the
//! reference category. The coefficient of the indicator column is therefore the
//! effect-minus-reference difference in mean (log-scale) expression.

use ndarray::Array2;

use crate::error::{DiffExpError, Result};
use crate::testing::utils::{GroupLabels, get_group_indices};

/// Column holding the group effect.
pub const GROUP_COLUMN: usize = 1;

#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    coef_names: Vec<String>,
    reference: String,
    effect: String,
    n_reference: usize,
    n_effect: usize,
}

impl DesignMatrix {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn coef_names(&self) -> &[String] {
        &self.coef_names
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn effect(&self) -> &str {
        &self.effect
    }

    pub fn n_reference(&self) -> usize {
        self.n_reference
    }

    pub fn n_effect(&self) -> usize {
        self.n_effect
    }
}

/// Build the intercept + group-indicator design for `labels`.
///
/// Fails with a configuration error when a label falls outside the
/// `{reference, effect}` pair or when either category has fewer than
/// `min_per_group` samples (never fewer than 2).
pub fn build_design(
    labels: &GroupLabels,
    reference: &str,
    effect: &str,
    min_per_group: usize,
) -> Result<DesignMatrix> {
    if labels.is_empty() {
        return Err(DiffExpError::empty("no sample labels supplied"));
    }
    if reference == effect {
        return Err(DiffExpError::configuration(format!(
            "reference and effect categories are both '{}'",
            reference
        )));
    }

    if let Some((i, unknown)) = labels
        .as_slice()
        .iter()
        .enumerate()
        .find(|(_, l)| l.as_str() != reference && l.as_str() != effect)
    {
        return Err(DiffExpError::configuration(format!(
            "sample {} has label '{}' outside the configured pair ('{}', '{}')",
            i, unknown, reference, effect
        )));
    }

    let (reference_indices, effect_indices) = get_group_indices(labels, reference, effect);
    let min_per_group = min_per_group.max(2);
    for (level, count) in [
        (reference, reference_indices.len()),
        (effect, effect_indices.len()),
    ] {
        if count < min_per_group {
            return Err(DiffExpError::configuration(format!(
                "category '{}' has {} samples, at least {} are required",
                level, count, min_per_group
            )));
        }
    }

    let n_samples = labels.len();
    let mut matrix = Array2::zeros((n_samples, 2));
    for i in 0..n_samples {
        matrix[[i, 0]] = 1.0;
    }
    for &i in &effect_indices {
        matrix[[i, GROUP_COLUMN]] = 1.0;
    }

    log::debug!(
        "Design: {} '{}' (reference) vs {} '{}' samples",
        reference_indices.len(),
        reference,
        effect_indices.len(),
        effect
    );

    Ok(DesignMatrix {
        matrix,
        coef_names: vec![
            "Intercept".to_string(),
            format!("{}_vs_{}", effect, reference),
        ],
        reference: reference.to_string(),
        effect: effect.to_string(),
        n_reference: reference_indices.len(),
        n_effect: effect_indices.len(),
    })
}
