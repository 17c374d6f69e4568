//! Ordinary least-squares fits of every gene against a shared design.
//!
//! The design matrix is factorized once (thin QR by modified Gram-Schmidt) and the
//! factors are reused, read-only, by every per-gene solve. Genes are fitted in
//! parallel with rayon and collected back in gene order.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::{DiffExpError, Result};
use crate::testing::ExclusionReason;
use crate::testing::design::DesignMatrix;
use crate::testing::effect::average_expression;

/// Relative tolerance below which a design column counts as linearly dependent.
const RANK_TOLERANCE: f64 = 1e-7;

/// Thin QR factorization `X = Q R` of an `n × p` design, with `R⁻¹` cached.
#[derive(Debug, Clone)]
pub struct QrDecomposition {
    q: Array2<f64>,
    r: Array2<f64>,
    r_inv: Array2<f64>,
}

impl QrDecomposition {
    /// Factorize `design`.
    ///
    /// Fails with a rank-deficiency error when the design leaves no residual
    /// degrees of freedom, and with a numerical-instability error when a column
    /// is (numerically) a linear combination of the others.
    pub fn new(design: &Array2<f64>) -> Result<Self> {
        let (n, p) = design.dim();
        if n == 0 || p == 0 {
            return Err(DiffExpError::empty("design matrix has zero rows or columns"));
        }
        if n <= p {
            return Err(DiffExpError::RankDeficiency {
                rank: n.min(p),
                n_samples: n,
                df_residual: n as isize - p as isize,
            });
        }
        if design.iter().any(|v| !v.is_finite()) {
            return Err(DiffExpError::numerical(
                "qr_decomposition",
                "design matrix contains non-finite values",
            ));
        }

        let mut q = design.to_owned();
        let mut r = Array2::zeros((p, p));

        for j in 0..p {
            for k in 0..j {
                let dot = q.column(k).dot(&q.column(j));
                r[[k, j]] = dot;
                for i in 0..n {
                    let qik = q[[i, k]];
                    q[[i, j]] -= dot * qik;
                }
            }

            let norm = q.column(j).dot(&q.column(j)).sqrt();
            let original = design.column(j).dot(&design.column(j)).sqrt();
            if original == 0.0 || !norm.is_finite() || norm <= RANK_TOLERANCE * original {
                return Err(DiffExpError::numerical(
                    "qr_decomposition",
                    format!("design column {} is linearly dependent on earlier columns", j),
                ));
            }

            r[[j, j]] = norm;
            q.column_mut(j).mapv_inplace(|v| v / norm);
        }

        let mut r_inv = Array2::zeros((p, p));
        for c in 0..p {
            let mut unit = Array1::zeros(p);
            unit[c] = 1.0;
            let column = back_substitute(&r, unit.view());
            r_inv.column_mut(c).assign(&column);
        }

        Ok(QrDecomposition { q, r, r_inv })
    }

    pub fn n_samples(&self) -> usize {
        self.q.nrows()
    }

    pub fn rank(&self) -> usize {
        self.r.nrows()
    }

    pub fn df_residual(&self) -> usize {
        self.n_samples() - self.rank()
    }

    /// Diagonal element `(XᵗX)⁻¹_jj`, computed as the squared norm of row `j` of `R⁻¹`.
    pub fn unscaled_variance(&self, j: usize) -> f64 {
        self.r_inv.row(j).iter().map(|v| v * v).sum()
    }

    /// Least-squares coefficients and residual sum of squares for one response vector.
    pub fn solve(&self, y: ArrayView1<f64>) -> (Array1<f64>, f64) {
        let qty = self.q.t().dot(&y);
        let coefficients = back_substitute(&self.r, qty.view());
        let fitted = self.q.dot(&qty);
        let rss = y
            .iter()
            .zip(fitted.iter())
            .map(|(obs, fit)| (obs - fit) * (obs - fit))
            .sum();
        (coefficients, rss)
    }
}

/// Solve `R x = b` for upper-triangular `R`.
fn back_substitute(r: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let p = r.nrows();
    let mut x = Array1::zeros(p);
    for i in (0..p).rev() {
        let mut sum = b[i];
        for k in (i + 1)..p {
            sum -= r[[i, k]] * x[k];
        }
        x[i] = sum / r[[i, i]];
    }
    x
}

/// Least-squares fit of a single gene.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneFit {
    pub gene_index: usize,
    pub coefficients: Array1<f64>,
    /// Residual standard deviation
    pub sigma: f64,
    pub df_residual: f64,
    /// Mean expression over all samples
    pub average_expression: f64,
}

impl GeneFit {
    pub fn residual_variance(&self) -> f64 {
        self.sigma * self.sigma
    }
}

#[derive(Debug, Clone)]
pub struct LinearModelFit {
    pub genes: Vec<GeneFit>,
    /// Genes left out of the fit, by input index
    pub excluded: Vec<(usize, ExclusionReason)>,
    pub qr: QrDecomposition,
}

impl LinearModelFit {
    /// `sqrt((XᵗX)⁻¹_jj)` for coefficient `j`, shared by all genes.
    pub fn unscaled_sd(&self, j: usize) -> f64 {
        self.qr.unscaled_variance(j).sqrt()
    }

    /// Sum of residual degrees of freedom over all fitted genes.
    pub fn df_pooled(&self) -> f64 {
        self.genes.iter().map(|g| g.df_residual).sum()
    }
}

/// Fit `expression[g, ..] ≈ X β_g` for every gene row `g`.
///
/// Rows containing NaN or infinite values are excluded and reported rather
/// than aborting the run.
pub fn lm_fit(expression: ArrayView2<f64>, design: &DesignMatrix) -> Result<LinearModelFit> {
    let (n_genes, n_samples) = expression.dim();
    if n_genes == 0 {
        return Err(DiffExpError::empty("expression matrix has no genes"));
    }
    if n_samples != design.n_samples() {
        return Err(DiffExpError::configuration(format!(
            "expression matrix has {} sample columns but the design has {} rows",
            n_samples,
            design.n_samples()
        )));
    }

    let qr = QrDecomposition::new(design.matrix())?;
    let df_residual = qr.df_residual() as f64;
    log::debug!(
        "QR factorized {}x{} design, residual df {}",
        qr.n_samples(),
        qr.rank(),
        df_residual
    );

    let outcomes: Vec<std::result::Result<GeneFit, usize>> = (0..n_genes)
        .into_par_iter()
        .map(|gene_index| {
            let row = expression.row(gene_index);
            if row.iter().any(|v| !v.is_finite()) {
                return Err(gene_index);
            }
            let (coefficients, rss) = qr.solve(row);
            Ok(GeneFit {
                gene_index,
                coefficients,
                sigma: (rss.max(0.0) / df_residual).sqrt(),
                df_residual,
                average_expression: average_expression(row),
            })
        })
        .collect();

    let mut genes = Vec::with_capacity(n_genes);
    let mut excluded = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(fit) => genes.push(fit),
            Err(gene_index) => excluded.push((gene_index, ExclusionReason::NonFiniteValues)),
        }
    }

    if !excluded.is_empty() {
        log::warn!(
            "Excluded {} of {} genes with non-finite expression values",
            excluded.len(),
            n_genes
        );
    }
    log::info!("Fitted linear models for {} genes", genes.len());

    Ok(LinearModelFit {
        genes,
        excluded,
        qr,
    })
}
