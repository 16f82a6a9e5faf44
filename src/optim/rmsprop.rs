//! RMSProp optimizer

use super::Optimizer;
use ndarray::Array1;

/// RMSProp: step sizes scaled by a decaying mean of squared gradients.
pub struct RmsProp {
    lr: f32,
    decay: f32,
    epsilon: f32,
    mean_sq: Option<Array1<f32>>,
}

impl RmsProp {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            decay: 0.9,
            epsilon: 1e-10,
            mean_sq: None,
        }
    }
}

impl Optimizer for RmsProp {
    fn step(&mut self, params: &mut Array1<f32>, grad: &Array1<f32>) {
        let grad_sq = grad * grad;
        let mean_sq = match self.mean_sq.take() {
            Some(ms) => ms * self.decay + &grad_sq * (1.0 - self.decay),
            None => grad_sq * (1.0 - self.decay),
        };

        let update = grad / &mean_sq.mapv(|v| (v + self.epsilon).sqrt()) * self.lr;
        *params -= &update;
        self.mean_sq = Some(mean_sq);
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rmsprop_descends_a_quadratic() {
        let mut params = array![3.0, -2.0];
        let mut opt = RmsProp::new(0.05);
        for _ in 0..500 {
            let grad = params.mapv(|x| 2.0 * x);
            opt.step(&mut params, &grad);
        }
        assert!(params.iter().all(|v| v.abs() < 0.1));
    }
}
