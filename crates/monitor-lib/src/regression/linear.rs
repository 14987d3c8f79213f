//! Ordinary least squares for `y = a + b * x`

/// Result of a linear fit; `None` fields mark degenerate input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFit {
    /// Intercept
    pub a: Option<f64>,
    /// Slope
    pub b: Option<f64>,
    /// Coefficient of determination
    pub r2: Option<f64>,
    /// Number of paired points considered
    pub n: usize,
}

impl LinearFit {
    fn degenerate(n: usize) -> Self {
        Self {
            a: None,
            b: None,
            r2: None,
            n,
        }
    }
}

/// Fit `y = a + b * x` over the paired prefix of `xs` and `ys`.
///
/// Sums are taken around the mean of `x` so that large accumulated counts do
/// not cancel catastrophically. When every `x` is identical the slope is
/// undefined and only `n` is reported. `r2` is 1 when every `y` is identical.
pub fn fit_linear(xs: &[f64], ys: &[f64]) -> LinearFit {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return LinearFit::degenerate(0);
    }

    let xs = &xs[..n];
    let ys = &ys[..n];

    if xs.iter().all(|x| *x == xs[0]) {
        return LinearFit::degenerate(n);
    }

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    if sxx == 0.0 {
        return LinearFit::degenerate(n);
    }

    let b = sxy / sxx;
    let a = mean_y - b * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        ss_res += (y - (a + b * x)).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    let r2 = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    LinearFit {
        a: Some(a),
        b: Some(b),
        r2: Some(r2),
        n,
    }
}
