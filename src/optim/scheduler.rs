//! Learning-rate decay schedules
//!
//! A schedule owns its own step counter, advanced once per optimizer
//! update. That counter is internal to the schedule and independent of any
//! epoch or step bookkeeping kept by the training state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Decay specification as supplied at compile time: a kind identifier plus
/// its two parameters, in the order the kind defines them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecayConfig {
    /// `"inverse time"` or `"cosine"`.
    pub kind: String,
    /// Schedule horizon in steps.
    pub decay_steps: u64,
    /// Decay rate for `"inverse time"`; floor fraction `alpha` for
    /// `"cosine"`.
    pub rate: f32,
}

impl DecayConfig {
    pub fn new(kind: impl Into<String>, decay_steps: u64, rate: f32) -> Self {
        Self {
            kind: kind.into(),
            decay_steps,
            rate,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum DecayKind {
    /// `lr / (1 + rate · step / decay_steps)`
    InverseTime { decay_steps: u64, decay_rate: f32 },
    /// `lr · ((1-α)·½(1+cos(π·min(step,T)/T)) + α)`
    Cosine { decay_steps: u64, alpha: f32 },
}

/// A stateful decay schedule bound to a base learning rate.
#[derive(Clone, Debug)]
pub struct Decay {
    kind: DecayKind,
    base_lr: f32,
    step: u64,
}

impl Decay {
    /// Resolve a decay specification. Unknown kinds are a configuration
    /// error.
    pub fn from_config(config: &DecayConfig, base_lr: f32) -> Result<Self> {
        let kind = match config.kind.as_str() {
            "inverse time" => DecayKind::InverseTime {
                decay_steps: config.decay_steps,
                decay_rate: config.rate,
            },
            "cosine" => DecayKind::Cosine {
                decay_steps: config.decay_steps,
                alpha: config.rate,
            },
            _ => return Err(Error::UnknownDecay(config.kind.clone())),
        };
        Ok(Self {
            kind,
            base_lr,
            step: 0,
        })
    }

    /// Learning rate at the current counter.
    pub fn lr(&self) -> f32 {
        match self.kind {
            DecayKind::InverseTime {
                decay_steps,
                decay_rate,
            } => self.base_lr / (1.0 + decay_rate * self.step as f32 / decay_steps as f32),
            DecayKind::Cosine { decay_steps, alpha } => {
                let t = self.step.min(decay_steps) as f32 / decay_steps as f32;
                let cosine = 0.5 * (1.0 + (PI * t).cos());
                self.base_lr * ((1.0 - alpha) * cosine + alpha)
            }
        }
    }

    /// Learning rate for the next update, advancing the internal counter.
    pub fn next_lr(&mut self) -> f32 {
        let lr = self.lr();
        self.step += 1;
        lr
    }

    /// Updates applied so far.
    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    /// Rewind the counter, as happens when a run re-initializes its
    /// variables.
    pub fn reset(&mut self) {
        self.step = 0;
    }
}
