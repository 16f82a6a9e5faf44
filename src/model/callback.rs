//! Lifecycle hooks for training events
//!
//! Hooks observe the run through a shared [`TrainState`] reference; they
//! cannot mutate it. Multiple hooks run in registration order at each
//! event.
//!
//! # Example
//!
//! ```rust
//! use convergir::model::{Callback, TrainState};
//!
//! struct EpochPrinter;
//!
//! impl Callback for EpochPrinter {
//!     fn on_epoch_end(&mut self, state: &TrainState) {
//!         println!("epoch {} done", state.epoch);
//!     }
//! }
//! ```

use super::TrainState;

/// Trait for training lifecycle hooks
///
/// All methods have default no-op implementations, so implementors only
/// write the events they care about.
pub trait Callback: Send {
    /// Called once before the first epoch
    fn on_train_begin(&mut self, _state: &TrainState) {}

    /// Called before each epoch
    fn on_epoch_begin(&mut self, _state: &TrainState) {}

    /// Called before each batch draw
    fn on_batch_begin(&mut self, _state: &TrainState) {}

    /// Called after each optimizer update
    fn on_batch_end(&mut self, _state: &TrainState) {}

    /// Called after each epoch
    fn on_epoch_end(&mut self, _state: &TrainState) {}

    /// Called once after the last epoch
    fn on_train_end(&mut self, _state: &TrainState) {}

    /// Hook name for logging
    fn name(&self) -> &str {
        "Callback"
    }
}

/// Dispatches events to registered hooks in registration order.
#[derive(Default)]
pub struct CallbackList {
    callbacks: Vec<Box<dyn Callback>>,
}

impl CallbackList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Later registrations fire later.
    pub fn add<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn on_train_begin(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_train_begin(state);
        }
    }

    pub fn on_epoch_begin(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_epoch_begin(state);
        }
    }

    pub fn on_batch_begin(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_batch_begin(state);
        }
    }

    pub fn on_batch_end(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_batch_end(state);
        }
    }

    pub fn on_epoch_end(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_epoch_end(state);
        }
    }

    pub fn on_train_end(&mut self, state: &TrainState) {
        for cb in &mut self.callbacks {
            cb.on_train_end(state);
        }
    }
}
