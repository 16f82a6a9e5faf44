//! Data provider contract and bundled providers
//!
//! A provider owns the sampling strategy: how training minibatches are
//! drawn, what the held-out split looks like, and how the compiled loss is
//! applied to targets and outputs. The training core only ever talks to
//! this trait.

mod dataset;

pub use dataset::{DataSet, Scaler};

use crate::graph::Values;
use crate::loss::Loss;
use crate::Result;
use ndarray::Array2;

/// Supplies batches and evaluates the per-component loss vector.
pub trait DataProvider {
    /// Per-component loss values for one `(targets, outputs)` pair.
    ///
    /// The number and order of components is the provider's contract and
    /// must be stable across calls.
    fn losses(&self, targets: &Values, outputs: &Values, loss: Loss) -> Vec<f32>;

    /// Cotangents of the weighted component sum with respect to the
    /// outputs: `∂(Σ wᵢ · lossᵢ) / ∂outputs`, structured like `outputs`.
    /// `weights` has one entry per component reported by [`Self::losses`].
    fn loss_cotangents(
        &self,
        targets: &Values,
        outputs: &Values,
        loss: Loss,
        weights: &[f32],
    ) -> Values;

    /// Draw the next training minibatch.
    fn train_next_batch(&mut self, batch_size: usize) -> Result<(Array2<f32>, Values)>;

    /// Draw the held-out test split of (up to) `n` samples.
    fn test(&mut self, n: usize) -> Result<(Array2<f32>, Values)>;
}
