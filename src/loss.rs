//! Loss registry
//!
//! Losses are looked up by the same string identifiers the public API has
//! always used, but resolve to a closed enumeration: an unknown name is a
//! configuration error at compile time, never a silent default.

use crate::{Error, Result};
use ndarray::Array2;

/// A per-component loss over one `(y_true, y_pred)` pair of arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Loss {
    MeanSquaredError,
    MeanAbsoluteError,
    SoftmaxCrossEntropy,
}

impl Loss {
    /// Resolve a loss identifier.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "MSE" | "mean squared error" => Ok(Loss::MeanSquaredError),
            "MAE" | "mean absolute error" => Ok(Loss::MeanAbsoluteError),
            "softmax cross entropy" => Ok(Loss::SoftmaxCrossEntropy),
            _ => Err(Error::UnknownLoss(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Loss::MeanSquaredError => "MSE",
            Loss::MeanAbsoluteError => "MAE",
            Loss::SoftmaxCrossEntropy => "softmax cross entropy",
        }
    }

    /// Scalar loss value.
    pub fn value(&self, y_true: &Array2<f32>, y_pred: &Array2<f32>) -> f32 {
        let n = y_pred.len() as f32;
        match self {
            Loss::MeanSquaredError => {
                let diff = y_pred - y_true;
                diff.iter().map(|d| d * d).sum::<f32>() / n
            }
            Loss::MeanAbsoluteError => {
                let diff = y_pred - y_true;
                diff.iter().map(|d| d.abs()).sum::<f32>() / n
            }
            Loss::SoftmaxCrossEntropy => {
                let rows = y_pred.nrows() as f32;
                let probs = softmax_rows(y_pred);
                let ce: f32 = y_true
                    .iter()
                    .zip(probs.iter())
                    .map(|(&t, &p)| -t * (p + 1e-10).ln())
                    .sum();
                ce / rows
            }
        }
    }

    /// Gradient of [`Loss::value`] with respect to the predictions.
    pub fn gradient(&self, y_true: &Array2<f32>, y_pred: &Array2<f32>) -> Array2<f32> {
        let n = y_pred.len() as f32;
        match self {
            Loss::MeanSquaredError => (y_pred - y_true) * (2.0 / n),
            Loss::MeanAbsoluteError => (y_pred - y_true).mapv(|d| d.signum() / n),
            Loss::SoftmaxCrossEntropy => {
                let rows = y_pred.nrows() as f32;
                (softmax_rows(y_pred) - y_true) / rows
            }
        }
    }
}

/// Row-wise softmax with the usual max-shift for stability.
fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.iter().sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn mse_value_and_gradient() {
        let t = array![[1.5], [2.5], [3.5]];
        let p = array![[1.0], [2.0], [3.0]];
        assert_relative_eq!(Loss::MeanSquaredError.value(&t, &p), 0.25, epsilon = 1e-6);

        let g = Loss::MeanSquaredError.gradient(&t, &p);
        // d/dp mean((p-t)^2) = 2(p-t)/n
        assert_relative_eq!(g[[0, 0]], -1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn mse_zero_for_perfect_prediction() {
        let t = array![[1.0], [2.0]];
        assert_relative_eq!(Loss::MeanSquaredError.value(&t, &t), 0.0);
    }

    #[test]
    fn mae_value() {
        let t = array![[1.5], [2.5]];
        let p = array![[1.0], [2.0]];
        assert_relative_eq!(Loss::MeanAbsoluteError.value(&t, &p), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]];
        let probs = softmax_rows(&logits);
        for row in probs.rows() {
            assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn cross_entropy_positive_and_finite() {
        let t = array![[1.0, 0.0, 0.0]];
        let p = array![[2.0, 1.0, 0.5]];
        let v = Loss::SoftmaxCrossEntropy.value(&t, &p);
        assert!(v > 0.0 && v.is_finite());
    }

    #[test]
    fn lookup_rejects_unknown_name() {
        assert!(matches!(
            Loss::from_name("hinge"),
            Err(crate::Error::UnknownLoss(_))
        ));
        assert_eq!(Loss::from_name("MSE").unwrap(), Loss::MeanSquaredError);
    }
}
