//! Adadelta optimizer

use super::Optimizer;
use ndarray::Array1;

/// Adadelta: Adagrad variant with decaying gradient and update accumulators.
pub struct Adadelta {
    lr: f32,
    rho: f32,
    epsilon: f32,
    grad_accum: Option<Array1<f32>>,
    update_accum: Option<Array1<f32>>,
}

impl Adadelta {
    pub fn new(lr: f32, rho: f32, epsilon: f32) -> Self {
        Self {
            lr,
            rho,
            epsilon,
            grad_accum: None,
            update_accum: None,
        }
    }

    /// The customary defaults.
    pub fn default_params() -> Self {
        Self::new(0.001, 0.95, 1e-8)
    }
}

impl Optimizer for Adadelta {
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>) {
        let n = params.len();
        let mut e_g = self.grad_accum.take().unwrap_or_else(|| Array1::zeros(n));
        let mut e_dx = self.update_accum.take().unwrap_or_else(|| Array1::zeros(n));

        // E[g²] = ρ E[g²] + (1-ρ) g²
        e_g = e_g * self.rho + &(grad * grad) * (1.0 - self.rho);

        // Δx = -√(E[Δx²]+ε)/√(E[g²]+ε) · g
        let rms_dx = e_dx.mapv(|v| (v + self.epsilon).sqrt());
        let rms_g = e_g.mapv(|v| (v + self.epsilon).sqrt());
        let dx = &rms_dx / &rms_g * grad;

        // E[Δx²] = ρ E[Δx²] + (1-ρ) Δx²
        e_dx = e_dx * self.rho + &(&dx * &dx) * (1.0 - self.rho);

        *params -= &(&dx * self.lr);

        self.grad_accum = Some(e_g);
        self.update_accum = Some(e_dx);
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
