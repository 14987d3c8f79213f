//! Cost model fitting
//!
//! This module fits two model families to a target's history of
//! `(accumulated_count, time_per_unit)` points:
//! - linear: `tpu = a + b * count` (ordinary least squares)
//! - exponential: `tpu = c * exp(d * count)` (OLS on `ln(tpu)`)
//!
//! and selects the better one by R², plus a short-window trend slope.

mod exponential;
mod linear;
mod trend;

pub use exponential::{fit_exponential, ExponentialFit};
pub use linear::{fit_linear, LinearFit};
pub use trend::{slope_last_k, TrendEstimator, DEFAULT_TREND_WINDOW};

use crate::models::{
    ExponentialParams, FittedModel, LinearParams, ModelKind, Target, TrendParams,
};
use chrono::{DateTime, Utc};

/// Default minimum history length before models are fitted
pub const DEFAULT_MIN_POINTS_FOR_FIT: usize = 6;

/// The better-fitting model family, or the absence of a usable one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreferredModel {
    Insufficient,
    Linear { a: f64, b: f64, r2: f64 },
    Exponential { c: f64, d: f64, r2: f64 },
}

impl PreferredModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            PreferredModel::Insufficient => ModelKind::Insufficient,
            PreferredModel::Linear { .. } => ModelKind::Linear,
            PreferredModel::Exponential { .. } => ModelKind::Exponential,
        }
    }

    pub fn r2(&self) -> Option<f64> {
        match self {
            PreferredModel::Insufficient => None,
            PreferredModel::Linear { r2, .. } | PreferredModel::Exponential { r2, .. } => {
                Some(*r2)
            }
        }
    }
}

/// Pick the model with the strictly larger R² among those that produced one.
///
/// On a tie the linear model is kept.
pub fn select_model(linear: &LinearFit, exponential: &ExponentialFit) -> PreferredModel {
    let lin = match (linear.a, linear.b, linear.r2) {
        (Some(a), Some(b), Some(r2)) => Some(PreferredModel::Linear { a, b, r2 }),
        _ => None,
    };
    let exp = match (exponential.c, exponential.d, exponential.r2) {
        (Some(c), Some(d), Some(r2)) => Some(PreferredModel::Exponential { c, d, r2 }),
        _ => None,
    };

    match (lin, exp) {
        (Some(l), Some(e)) => {
            if e.r2() > l.r2() {
                e
            } else {
                l
            }
        }
        (Some(l), None) => l,
        (None, Some(e)) => e,
        (None, None) => PreferredModel::Insufficient,
    }
}

/// Result of evaluating both model families over one history
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    pub n_points: usize,
    pub linear: LinearFit,
    pub exponential: ExponentialFit,
    pub preferred: PreferredModel,
    pub trend_slope: Option<f64>,
}

impl ModelEvaluation {
    /// Build the persisted record for this evaluation
    pub fn into_record(self, target: Target, ts: DateTime<Utc>) -> FittedModel {
        FittedModel {
            ts,
            target,
            n_points: self.n_points,
            linear: LinearParams {
                a: self.linear.a,
                b: self.linear.b,
                r2: self.linear.r2,
            },
            exponential: ExponentialParams {
                c: self.exponential.c,
                d: self.exponential.d,
                r2: self.exponential.r2,
            },
            preferred: self.preferred.kind(),
            trend: TrendParams {
                slope_last_k: self.trend_slope,
            },
        }
    }
}

/// Fits both model families once a history is long enough
#[derive(Debug, Clone, Copy)]
pub struct ModelFitter {
    min_points: usize,
    trend: TrendEstimator,
}

impl ModelFitter {
    pub fn new(min_points: usize, trend_window: usize) -> Self {
        Self {
            min_points,
            trend: TrendEstimator::new(trend_window),
        }
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Evaluate both models, or `None` while the history is shorter than
    /// the minimum point count
    pub fn evaluate(&self, counts: &[f64], tpus: &[f64]) -> Option<ModelEvaluation> {
        let n_points = counts.len().min(tpus.len());
        if n_points < self.min_points {
            return None;
        }

        let linear = fit_linear(counts, tpus);
        let exponential = fit_exponential(counts, tpus);
        let preferred = select_model(&linear, &exponential);
        let trend_slope = self.trend.slope(counts, tpus);

        Some(ModelEvaluation {
            n_points,
            linear,
            exponential,
            preferred,
            trend_slope,
        })
    }
}

impl Default for ModelFitter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_POINTS_FOR_FIT, DEFAULT_TREND_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_never_picks_null_r2() {
        let linear = LinearFit {
            a: Some(1.0),
            b: Some(0.5),
            r2: Some(0.2),
            n: 6,
        };
        let exponential = ExponentialFit {
            n_used: 0,
            n_total: 6,
            ..Default::default()
        };
        assert_eq!(
            select_model(&linear, &exponential).kind(),
            ModelKind::Linear
        );

        let linear = LinearFit {
            n: 6,
            ..Default::default()
        };
        let exponential = ExponentialFit {
            c: Some(1.0),
            d: Some(0.1),
            r2: Some(0.1),
            n_used: 6,
            n_total: 6,
        };
        assert_eq!(
            select_model(&linear, &exponential).kind(),
            ModelKind::Exponential
        );
    }

    #[test]
    fn test_selection_insufficient_when_both_null() {
        let choice = select_model(&LinearFit::default(), &ExponentialFit::default());
        assert_eq!(choice, PreferredModel::Insufficient);
        assert!(choice.r2().is_none());
    }

    #[test]
    fn test_selection_prefers_strictly_larger_r2() {
        let linear = LinearFit {
            a: Some(0.0),
            b: Some(1.0),
            r2: Some(0.9),
            n: 6,
        };
        let exponential = ExponentialFit {
            c: Some(1.0),
            d: Some(0.1),
            r2: Some(0.95),
            n_used: 6,
            n_total: 6,
        };
        assert_eq!(
            select_model(&linear, &exponential).kind(),
            ModelKind::Exponential
        );

        let tied = ExponentialFit {
            r2: Some(0.9),
            ..exponential
        };
        assert_eq!(select_model(&linear, &tied).kind(), ModelKind::Linear);
    }

    #[test]
    fn test_fitter_waits_for_min_points() {
        let fitter = ModelFitter::new(6, 6);
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert!(fitter.evaluate(&xs, &ys).is_none());
    }

    #[test]
    fn test_fitter_prefers_linear_for_linear_growth() {
        let fitter = ModelFitter::default();
        let xs: Vec<f64> = (1..=6).map(|i| (i * 100) as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.05 + 0.001 * x).collect();

        let eval = fitter.evaluate(&xs, &ys).unwrap();
        assert_eq!(eval.n_points, 6);
        assert_eq!(eval.preferred.kind(), ModelKind::Linear);
        assert!(eval.linear.r2.unwrap() > eval.exponential.r2.unwrap());
        assert!((eval.trend_slope.unwrap() - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_fitter_prefers_exponential_for_exponential_growth() {
        let fitter = ModelFitter::default();
        let xs: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.01 * (0.8 * x).exp()).collect();

        let eval = fitter.evaluate(&xs, &ys).unwrap();
        assert_eq!(eval.preferred.kind(), ModelKind::Exponential);
        match eval.preferred {
            PreferredModel::Exponential { c, d, r2 } => {
                assert!((c - 0.01).abs() < 1e-9);
                assert!((d - 0.8).abs() < 1e-9);
                assert!((r2 - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[test]
    fn test_evaluation_record_carries_all_fields() {
        let fitter = ModelFitter::default();
        let xs: Vec<f64> = (1..=6).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x).collect();
        let ts = Utc::now();

        let record = fitter
            .evaluate(&xs, &ys)
            .unwrap()
            .into_record(Target::from("chunks"), ts);

        assert_eq!(record.target.as_str(), "chunks");
        assert_eq!(record.n_points, 6);
        assert_eq!(record.ts, ts);
        assert!((record.linear.b.unwrap() - 2.0).abs() < 1e-9);
        assert!(record.exponential.c.is_some());
        assert!(record.trend.slope_last_k.is_some());
    }
}
