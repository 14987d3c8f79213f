//! Short-window trend estimation
//!
//! The whole-history fit averages away recent acceleration; the trend slope
//! looks only at the last `k` history points.

use super::linear::fit_linear;

/// Default number of trailing points in the trend window
pub const DEFAULT_TREND_WINDOW: usize = 6;

/// Slope of the OLS line through the last `min(k, len)` points.
///
/// Returns `None` when fewer than two points exist, or when the window is
/// degenerate (all counts identical).
pub fn slope_last_k(xs: &[f64], ys: &[f64], k: usize) -> Option<f64> {
    let len = xs.len().min(ys.len());
    if len < 2 {
        return None;
    }
    let start = len - k.min(len);
    fit_linear(&xs[start..len], &ys[start..len]).b
}

/// Trend estimator over a fixed trailing window
#[derive(Debug, Clone, Copy)]
pub struct TrendEstimator {
    window: usize,
}

impl TrendEstimator {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn slope(&self, xs: &[f64], ys: &[f64]) -> Option<f64> {
        slope_last_k(xs, ys, self.window)
    }
}

impl Default for TrendEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_WINDOW)
    }
}
