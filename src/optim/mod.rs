//! Optimizers and learning-rate schedules
//!
//! Optimizer identifiers split into two families: a fixed set of batch
//! quasi-Newton/line-search methods that run to convergence on one
//! minibatch, and stochastic gradient-based rules that iterate step by
//! step. Lookup is by the public string surface; unknown names are a
//! configuration error.

mod adadelta;
mod adagrad;
mod adam;
mod optimizer;
pub mod quasi_newton;
mod rmsprop;
mod scheduler;
mod sgd;

pub use adadelta::Adadelta;
pub use adagrad::Adagrad;
pub use adam::Adam;
pub use optimizer::Optimizer;
pub use quasi_newton::{
    minimize, BatchObjective, QuasiNewtonMethod, Solution, StopCriteria,
};
pub use rmsprop::RmsProp;
pub use scheduler::{Decay, DecayConfig};
pub use sgd::Sgd;

use crate::{Error, Result};

/// The stochastic gradient-based family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradientKind {
    Sgd,
    SgdNesterov,
    Adagrad,
    Adadelta,
    RmsProp,
    Adam,
}

impl GradientKind {
    pub fn name(&self) -> &'static str {
        match self {
            GradientKind::Sgd => "sgd",
            GradientKind::SgdNesterov => "sgdnesterov",
            GradientKind::Adagrad => "adagrad",
            GradientKind::Adadelta => "adadelta",
            GradientKind::RmsProp => "rmsprop",
            GradientKind::Adam => "adam",
        }
    }

    /// Instantiate the update rule with its customary hyperparameters.
    /// Adagrad and Adadelta pin their own step sizes; the others take `lr`.
    pub fn build(&self, lr: f32) -> Box<dyn Optimizer> {
        match self {
            GradientKind::Sgd => Box::new(Sgd::new(lr)),
            GradientKind::SgdNesterov => Box::new(Sgd::nesterov(lr, 0.9)),
            GradientKind::Adagrad => Box::new(Adagrad::new(0.01)),
            GradientKind::Adadelta => Box::new(Adadelta::default_params()),
            GradientKind::RmsProp => Box::new(RmsProp::new(lr)),
            GradientKind::Adam => Box::new(Adam::default_params(lr)),
        }
    }
}

/// How a compiled model will train: step-by-step on gradients, or one
/// minimize-to-convergence call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerChoice {
    Gradient(GradientKind),
    QuasiNewton(QuasiNewtonMethod),
}

impl OptimizerChoice {
    /// Resolve an optimizer identifier. Batch method names are matched
    /// first; anything else must be a known gradient rule.
    pub fn from_name(name: &str) -> Result<Self> {
        if let Some(method) = QuasiNewtonMethod::from_name(name) {
            return Ok(OptimizerChoice::QuasiNewton(method));
        }
        let kind = match name {
            "sgd" => GradientKind::Sgd,
            "sgdnesterov" => GradientKind::SgdNesterov,
            "adagrad" => GradientKind::Adagrad,
            "adadelta" => GradientKind::Adadelta,
            "rmsprop" => GradientKind::RmsProp,
            "adam" => GradientKind::Adam,
            _ => return Err(Error::UnknownOptimizer(name.to_string())),
        };
        Ok(OptimizerChoice::Gradient(kind))
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerChoice::Gradient(kind) => kind.name(),
            OptimizerChoice::QuasiNewton(method) => method.name(),
        }
    }
}
