use std::cmp::Ordering;

use crate::error::{DiffExpError, Result};

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// The BH procedure controls the false discovery rate (FDR), which is the expected
/// proportion of false positives among all rejected null hypotheses. Adjusted
/// values are returned in the order of the input.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
///
/// # Returns
/// * `Result<Vec<f64>>` - Vector of adjusted p-values
///
/// # Example
/// ```
/// use single_moderated::testing::correction::benjamini_hochberg_correction;
///
/// let p_values = vec![0.01, 0.03, 0.05];
/// let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
/// assert_eq!(adjusted.len(), 3);
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    let n = p_values.len();
    if n == 0 {
        return Err(DiffExpError::empty("Empty p-value array"));
    }

    // Validate p-values
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(DiffExpError::numerical(
                "benjamini_hochberg_correction",
                format!("Invalid p-value at index {}: {}", i, p),
            ));
        }
    }

    // Stable sort keeps ties in input order
    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    // Process from largest to smallest p-value
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * n as f64 / rank as f64).clamp(0.0, 1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_benjamini_hochberg_empty_input() {
        let result = benjamini_hochberg_correction(&[]);
        assert!(matches!(result, Err(DiffExpError::EmptyInput { .. })));
        assert_eq!(result.unwrap_err().to_string(), "Empty input: Empty p-value array");
    }

    #[test]
    fn test_benjamini_hochberg_invalid_pvalues() {
        let result = benjamini_hochberg_correction(&[0.01, -0.5, 0.03]);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid p-value at index 1")
        );

        let result = benjamini_hochberg_correction(&[0.01, 1.5, 0.03]);
        assert!(result.is_err());

        let result = benjamini_hochberg_correction(&[0.01, f64::NAN]);
        assert!(result.is_err());
    }

    #[test]
    fn test_benjamini_hochberg_step_up_reference() {
        // Hand-computed: p(i) * 10 / i, then running minimum from the largest rank down
        let p_values = vec![
            0.001, 0.008, 0.039, 0.041, 0.042, 0.06, 0.074, 0.205, 0.212, 0.216,
        ];
        let expected = vec![
            0.01,
            0.04,
            0.084,
            0.084,
            0.084,
            0.1,
            0.74 / 7.0,
            0.216,
            0.216,
            0.216,
        ];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_benjamini_hochberg_identical_pvalues() {
        let p_values = vec![0.05, 0.05, 0.05];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
        for a in adjusted {
            assert_relative_eq!(a, 0.05, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_benjamini_hochberg_unordered_pvalues() {
        let p_values = vec![0.05, 0.01, 0.1, 0.04, 0.02];
        let expected = vec![0.0625, 0.05, 0.1, 0.0625, 0.05];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_benjamini_hochberg_guarantees() {
        let p_values = vec![0.3, 0.0001, 0.9, 0.02, 0.5, 0.02, 1.0, 0.0];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();

        for (p, q) in p_values.iter().zip(adjusted.iter()) {
            assert!(q >= p);
            assert!((0.0..=1.0).contains(q));
        }

        let mut order: Vec<usize> = (0..p_values.len()).collect();
        order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
        for w in order.windows(2) {
            assert!(adjusted[w[0]] <= adjusted[w[1]]);
        }
    }

    #[test]
    fn test_benjamini_hochberg_single_pvalue() {
        let adjusted = benjamini_hochberg_correction(&[0.025]).unwrap();
        assert_relative_eq!(adjusted[0], 0.025, epsilon = 1e-10);
    }
}
