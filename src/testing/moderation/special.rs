//! Polygamma helpers that statrs does not provide.

use crate::error::{DiffExpError, Result};

/// Digamma function
pub fn digamma(x: f64) -> f64 {
    statrs::function::gamma::digamma(x)
}

/// Trigamma function (derivative of digamma)
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    if x >= 8.0 {
        let x2 = x * x;
        let x3 = x2 * x;
        let x5 = x3 * x2;
        let x7 = x5 * x2;
        let x9 = x7 * x2;
        return 1.0 / x + 0.5 / x2 + 1.0 / (6.0 * x3) - 1.0 / (30.0 * x5) + 1.0 / (42.0 * x7)
            - 1.0 / (30.0 * x9);
    }

    let mut result = 0.0;
    let mut z = x;
    while z < 8.0 {
        result += 1.0 / (z * z);
        z += 1.0;
    }
    result + trigamma(z)
}

/// Tetragamma function (second derivative of digamma), for `x > 0`
pub fn tetragamma(x: f64) -> f64 {
    if x >= 8.0 {
        let x2 = x * x;
        let x3 = x2 * x;
        let x4 = x2 * x2;
        let x6 = x4 * x2;
        let x8 = x6 * x2;
        let x10 = x8 * x2;
        return -1.0 / x2 - 1.0 / x3 - 0.5 / x4 + 1.0 / (6.0 * x6) - 1.0 / (6.0 * x8)
            + 0.3 / x10;
    }

    let mut result = 0.0;
    let mut z = x;
    while z < 8.0 {
        result -= 2.0 / (z * z * z);
        z += 1.0;
    }
    result + tetragamma(z)
}

/// Solve `trigamma(x) = y` for `x > 0` by Newton iteration.
pub fn trigamma_inverse(y: f64) -> Result<f64> {
    if !(y.is_finite() && y > 0.0) {
        return Err(DiffExpError::numerical(
            "trigamma_inverse",
            format!("argument must be positive and finite, got {}", y),
        ));
    }

    // Asymptotes: trigamma(x) ~ 1/x² near zero and ~ 1/x for large x
    if y > 1e7 {
        return Ok(1.0 / y.sqrt());
    }
    if y < 1e-6 {
        return Ok(1.0 / y);
    }

    let mut x = 0.5 + 1.0 / y;
    for _ in 0..50 {
        let tri = trigamma(x);
        let step = tri * (1.0 - tri / y) / tetragamma(x);
        x += step;
        if -step / x < 1e-8 {
            return Ok(x);
        }
    }

    log::warn!("trigamma_inverse did not converge for y = {}", y);
    Ok(x)
}
