//! Gradient descent, plain and with Nesterov momentum

use super::Optimizer;
use ndarray::Array1;

/// Gradient descent with optional Nesterov momentum.
pub struct Sgd {
    lr: f32,
    momentum: f32,
    nesterov: bool,
    velocity: Option<Array1<f32>>,
}

impl Sgd {
    /// Plain gradient descent.
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            momentum: 0.0,
            nesterov: false,
            velocity: None,
        }
    }

    /// Nesterov accelerated gradient.
    pub fn nesterov(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            nesterov: true,
            velocity: None,
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>) {
        if self.momentum == 0.0 {
            *params -= &(grad * self.lr);
            return;
        }

        let v_prev = self
            .velocity
            .take()
            .unwrap_or_else(|| Array1::zeros(params.len()));
        // v = momentum * v - lr * grad
        let v = &v_prev * self.momentum - grad * self.lr;
        if self.nesterov {
            *params += &(&v * self.momentum - grad * self.lr);
        } else {
            *params += &v;
        }
        self.velocity = Some(v);
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
