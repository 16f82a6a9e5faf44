//! Network definition contract
//!
//! The training core never builds a network itself; it drives one through
//! this trait. A network owns its parameters, runs forward passes under the
//! flags carried by a [`Feed`], and pulls objective cotangents back to a
//! flat parameter gradient. How it differentiates is its own business.

use super::{Feed, Session, Values};
use crate::Result;
use ndarray::{Array1, ArrayView1};
use rand::RngCore;

/// Parameter-norm penalty a network may declare. The training core appends
/// its value as an extra loss component and folds its gradient into the
/// objective gradient.
#[derive(Clone, Copy, Debug)]
pub enum Regularization {
    L1(f32),
    L2(f32),
}

impl Regularization {
    /// Penalty value for the given flat parameters.
    pub fn penalty(&self, params: &Array1<f32>) -> f32 {
        match self {
            Regularization::L1(c) => c * params.iter().map(|p| p.abs()).sum::<f32>(),
            Regularization::L2(c) => c * params.iter().map(|p| p * p).sum::<f32>(),
        }
    }

    /// Gradient of the penalty with respect to the flat parameters.
    pub fn gradient(&self, params: &Array1<f32>) -> Array1<f32> {
        match self {
            Regularization::L1(c) => params.mapv(|p| c * p.signum()),
            Regularization::L2(c) => params.mapv(|p| 2.0 * c * p),
        }
    }
}

/// A compiled network the harness can train.
///
/// Implementations that use dropout draw their masks from internal state;
/// the same mask must be replayed by the [`Network::pullback`] that follows
/// a training-mode [`Network::forward`].
pub trait Network {
    /// Total number of learnable scalars.
    fn param_len(&self) -> usize;

    /// Snapshot of the learnable parameters as one flat vector.
    fn params(&self) -> Array1<f32>;

    /// Overwrite the learnable parameters from one flat vector.
    fn set_params(&mut self, flat: ArrayView1<'_, f32>) -> Result<()>;

    /// (Re)initialize all learnable parameters.
    fn initialize(&mut self, rng: &mut dyn RngCore) -> Result<()>;

    /// One forward pass honoring the feed's training/dropout/data-id flags.
    fn forward(&self, session: &mut Session, feed: &Feed<'_>) -> Result<Values>;

    /// Pull per-output cotangents (same structure as the matching forward's
    /// outputs) back to the gradient of the objective over the flat
    /// parameters.
    fn pullback(
        &self,
        session: &mut Session,
        feed: &Feed<'_>,
        cotangents: &Values,
    ) -> Result<Array1<f32>>;

    /// Optional parameter-norm penalty.
    fn regularizer(&self) -> Option<Regularization> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn l2_penalty_and_gradient() {
        let reg = Regularization::L2(0.5);
        let params = array![1.0, -2.0];
        assert_relative_eq!(reg.penalty(&params), 2.5);
        let g = reg.gradient(&params);
        assert_relative_eq!(g[0], 1.0);
        assert_relative_eq!(g[1], -2.0);
    }

    #[test]
    fn l1_penalty_and_gradient() {
        let reg = Regularization::L1(2.0);
        let params = array![1.0, -3.0];
        assert_relative_eq!(reg.penalty(&params), 8.0);
        let g = reg.gradient(&params);
        assert_relative_eq!(g[0], 2.0);
        assert_relative_eq!(g[1], -2.0);
    }
}
