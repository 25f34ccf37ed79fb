use crate::batch::Targets;
use crate::error::LearnError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// A scalar evaluation metric computed from a batch's output and targets.
///
/// Metrics are averaged over a validation pass, weighted by batch size, by
/// the callback handler.
pub trait Metric<T: Tensor>: Debug {
    /// Display name, used as the column / history key.
    fn name(&self) -> &str;

    /// Computes the metric for one batch.
    fn compute(&self, output: &T, targets: &Targets<T>) -> Result<f32, LearnError>;
}
