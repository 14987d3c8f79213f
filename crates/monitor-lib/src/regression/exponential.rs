//! Log-linearized exponential fit `y = c * exp(d * x)`

use super::linear::fit_linear;

/// Result of an exponential fit with diagnostics on the points used
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExponentialFit {
    pub c: Option<f64>,
    pub d: Option<f64>,
    /// R² of the fit in log space
    pub r2: Option<f64>,
    /// Points with strictly positive `y`
    pub n_used: usize,
    pub n_total: usize,
}

/// Fit `ln(y) = ln(c) + d * x` using only pairs with `y > 0`.
///
/// Fewer than two usable points, or a degenerate log-space fit, yields `None`
/// parameters with the point counts still reported.
pub fn fit_exponential(xs: &[f64], ys: &[f64]) -> ExponentialFit {
    let n_total = xs.len().min(ys.len());

    let (used_x, log_y): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(_, y)| **y > 0.0)
        .map(|(x, y)| (*x, y.ln()))
        .unzip();

    let n_used = used_x.len();
    let empty = ExponentialFit {
        n_used,
        n_total,
        ..Default::default()
    };

    if n_used < 2 {
        return empty;
    }

    let lin = fit_linear(&used_x, &log_y);
    match (lin.a, lin.b) {
        (Some(a), Some(b)) => ExponentialFit {
            c: Some(a.exp()),
            d: Some(b),
            r2: lin.r2,
            n_used,
            n_total,
        },
        _ => empty,
    }
}
