//! Adam optimizer

use super::Optimizer;
use ndarray::Array1;

/// Adam optimizer (Adaptive Moment Estimation)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Option<Array1<f32>>,
    v: Option<Array1<f32>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: None,
            v: None,
        }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>) {
        self.t += 1;

        // Bias correction folded into the step size
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        // m_t = β1 * m_{t-1} + (1 - β1) * g
        let m_t = match self.m.take() {
            Some(m) => m * self.beta1 + grad * (1.0 - self.beta1),
            None => grad * (1.0 - self.beta1),
        };

        // v_t = β2 * v_{t-1} + (1 - β2) * g²
        let grad_sq = grad * grad;
        let v_t = match self.v.take() {
            Some(v) => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
            None => grad_sq * (1.0 - self.beta2),
        };

        // θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
        let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
        *params -= &update;

        self.m = Some(m_t);
        self.v = Some(v_t);
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
