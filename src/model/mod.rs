//! Training core: the model orchestrator, its mutable state, and the loss
//! history
//!
//! [`Model`] drives the whole run: `compile` fixes the objective and the
//! optimizer, `train` opens a session and executes either the stochastic
//! loop or one batch minimize-to-convergence call, validating on the
//! configured cadence. [`TrainState`] is the snapshot the run mutates;
//! [`LossHistory`] is the append-only record it returns.

mod callback;
mod history;
#[allow(clippy::module_inception)]
mod model;
mod state;

pub use callback::{Callback, CallbackList};
pub use history::LossHistory;
pub use model::{CompileConfig, Model, TrainOptions};
pub use state::TrainState;
