use super::param_group::ParamGroup;
use crate::error::LearnError;

/// Trait defining the interface of an engine optimizer.
///
/// Optimizers are responsible for updating model parameters based on their
/// gradients. The math lives in the engine; the training loop only drives it
/// and adjusts the hyper-parameters stored in the parameter groups.
pub trait Optimizer: std::fmt::Debug + Send + Sync {
    /// Performs a single optimization step using the current gradients.
    fn step(&mut self) -> Result<(), LearnError>;

    /// Clears the gradients of all parameters managed by the optimizer.
    fn zero_grad(&mut self);

    /// Returns an immutable slice of the parameter groups.
    fn param_groups(&self) -> &[ParamGroup];

    /// Returns a mutable slice of the parameter groups, so that learning
    /// rates and other hyper-parameters can be changed between steps.
    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Multiplies every trainable parameter of `group` by `1 - factor`.
    ///
    /// Used for decoupled ("true") weight decay, applied right before `step`.
    fn decay_weights(&mut self, group: usize, factor: f32) -> Result<(), LearnError>;
}
