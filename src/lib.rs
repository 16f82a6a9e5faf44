//! # Convergir: Scientific-ML Training Harness
//!
//! Convergir coordinates the training of scientific machine-learning models
//! (physics-informed networks and friends) on top of a graph-execution
//! engine: optimizer selection, minibatch iteration, periodic validation,
//! Monte-Carlo dropout uncertainty estimation, and best-checkpoint
//! tracking.
//!
//! ## Architecture
//!
//! - **model**: the training core: `Model`, `TrainState`, `LossHistory`,
//!   lifecycle callbacks
//! - **graph**: execution-engine facade: sessions, feeds, the network
//!   contract
//! - **data**: data-provider contract and the bundled fitting `DataSet`
//! - **optim**: gradient optimizers, decay schedules, and the batch
//!   quasi-Newton methods
//! - **loss / metrics / init**: string-keyed registries over closed
//!   enumerations
//! - **nets**: reference network definitions
//! - **plot**: terminal diagnostics
//!
//! ## Example
//!
//! ```no_run
//! use convergir::data::DataSet;
//! use convergir::nets::LinearNet;
//! use convergir::{CompileConfig, Model, TrainOptions};
//! # use ndarray::Array2;
//!
//! # fn main() -> convergir::Result<()> {
//! # let (x_train, y_train, x_test, y_test): (Array2<f32>, Array2<f32>, Array2<f32>, Array2<f32>) = todo!();
//! let data = DataSet::from_arrays(x_train, y_train, x_test, y_test)?;
//! let net = LinearNet::new(1, 1);
//! let mut model = Model::new(data, net);
//!
//! model.compile(
//!     CompileConfig::new("adam", 0.001, 16, 100).metrics(&["l2 relative error"])?,
//! )?;
//! let (history, state) = model.train(TrainOptions::new(1000).validation_every(100))?;
//! println!("best train loss: {}", state.best_loss_train);
//! # let _ = history;
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod graph;
pub mod init;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod nets;
pub mod optim;
pub mod plot;

pub mod error;

// Re-export the training core
pub use error::{Error, Result};
pub use model::{Callback, CompileConfig, LossHistory, Model, TrainOptions, TrainState};
