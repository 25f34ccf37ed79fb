//! Shared types and tensor-engine boundary for the learnkit training stack.
//!
//! The training loop in `learnkit-train` never touches tensor math directly;
//! everything it needs from an engine is expressed by the traits in this
//! crate.

pub mod batch;
pub mod device;
pub mod error;
pub mod metric;
pub mod nn;
pub mod optim;
pub mod tensor;
pub mod utils;

pub use batch::{determine_phase, Batch, Phase, Targets};
pub use device::Device;
pub use error::LearnError;
pub use metric::Metric;
pub use nn::{Layer, LayerGroup, LayerGroups, LossComponent, LossFunction, Model, SharedLayer};
pub use optim::{OptimWrapper, Optimizer, OptimizerFactory, ParamGroup, SharedOptimizer};
pub use tensor::Tensor;
