//! Execution-engine facade
//!
//! The harness drives a single compiled computation graph through a scoped
//! [`Session`], feeding it structured input maps and reading back per-head
//! value arrays. The network side of the graph is supplied through the
//! [`Network`] contract.

mod feed;
mod network;
mod session;
mod values;

pub use feed::{DataId, Feed, FeedTargets};
pub use network::{Network, Regularization};
pub use session::{Session, SessionOptions};
pub use values::Values;
