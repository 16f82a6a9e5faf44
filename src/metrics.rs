//! Evaluation metrics
//!
//! Metrics are resolved by string identifier from a closed enumeration;
//! a directly supplied callable passes through unchanged. Unknown names
//! are a configuration error.

use crate::{Error, Result};
use ndarray::Array2;
use std::sync::Arc;

type MetricFn = dyn Fn(&Array2<f32>, &Array2<f32>) -> f32 + Send + Sync;

/// A metric over one `(y_true, y_pred)` pair of arrays.
#[derive(Clone)]
pub enum Metric {
    /// `||y_pred - y_true|| / ||y_true||` over all elements.
    L2RelativeError,
    MeanSquaredError,
    MeanAbsoluteError,
    /// Fraction of rows whose argmax matches.
    Accuracy,
    /// A user-supplied metric, passed through untouched.
    Custom(Arc<MetricFn>),
}

impl Metric {
    /// Resolve a metric identifier.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "l2 relative error" => Ok(Metric::L2RelativeError),
            "MSE" | "mean squared error" => Ok(Metric::MeanSquaredError),
            "MAE" | "mean absolute error" => Ok(Metric::MeanAbsoluteError),
            "accuracy" => Ok(Metric::Accuracy),
            _ => Err(Error::UnknownMetric(name.to_string())),
        }
    }

    /// Wrap a callable as a metric.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Array2<f32>, &Array2<f32>) -> f32 + Send + Sync + 'static,
    {
        Metric::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::L2RelativeError => "l2 relative error",
            Metric::MeanSquaredError => "MSE",
            Metric::MeanAbsoluteError => "MAE",
            Metric::Accuracy => "accuracy",
            Metric::Custom(_) => "custom",
        }
    }

    /// Apply the metric.
    pub fn compute(&self, y_true: &Array2<f32>, y_pred: &Array2<f32>) -> f32 {
        match self {
            Metric::L2RelativeError => {
                let num: f32 = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(&t, &p)| (p - t) * (p - t))
                    .sum::<f32>()
                    .sqrt();
                let den: f32 = y_true.iter().map(|&t| t * t).sum::<f32>().sqrt();
                num / den
            }
            Metric::MeanSquaredError => {
                let n = y_true.len() as f32;
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(&t, &p)| (p - t) * (p - t))
                    .sum::<f32>()
                    / n
            }
            Metric::MeanAbsoluteError => {
                let n = y_true.len() as f32;
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(&t, &p)| (p - t).abs())
                    .sum::<f32>()
                    / n
            }
            Metric::Accuracy => {
                if y_true.nrows() == 0 {
                    return 0.0;
                }
                let correct = y_true
                    .rows()
                    .into_iter()
                    .zip(y_pred.rows())
                    .filter(|(t, p)| argmax(t) == argmax(p))
                    .count();
                correct as f32 / y_true.nrows() as f32
            }
            Metric::Custom(f) => f(y_true, y_pred),
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn argmax(row: &ndarray::ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    best
}
