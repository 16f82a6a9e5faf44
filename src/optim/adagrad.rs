//! Adagrad optimizer

use super::Optimizer;
use ndarray::Array1;

/// Adagrad: per-coordinate step sizes from accumulated squared gradients.
pub struct Adagrad {
    lr: f32,
    epsilon: f32,
    accum: Option<Array1<f32>>,
}

impl Adagrad {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            epsilon: 1e-8,
            accum: None,
        }
    }
}

impl Optimizer for Adagrad {
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>) {
        let grad_sq = grad * grad;
        let accum = match self.accum.take() {
            Some(a) => a + &grad_sq,
            None => grad_sq,
        };

        let update = grad / &(accum.mapv(f32::sqrt) + self.epsilon) * self.lr;
        *params -= &update;
        self.accum = Some(accum);
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
