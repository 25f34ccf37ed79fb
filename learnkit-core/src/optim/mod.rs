// learnkit-core/src/optim/mod.rs

//! Optimizer boundary.
//!
//! This module provides the engine-facing `Optimizer` trait, the `ParamGroup`
//! structure it is configured with, and the `OptimWrapper` that maps
//! per-layer-group hyper-parameters onto parameter groups.

pub mod optimizer_trait;
pub mod param_group;
pub mod wrapper;

pub use optimizer_trait::Optimizer;
pub use param_group::{ParamGroup, ParamGroupOptions};
pub use wrapper::{
    read_optimizer, write_optimizer, OptimWrapper, OptimizerFactory, SharedOptimizer,
};
