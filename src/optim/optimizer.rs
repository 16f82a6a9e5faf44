//! Gradient-optimizer trait

use ndarray::Array1;

/// A stochastic gradient-based update rule over flat parameter vectors.
pub trait Optimizer {
    /// Apply one update given the objective gradient at `params`.
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>);

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
