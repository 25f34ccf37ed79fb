use crate::batch::Targets;
use crate::error::LearnError;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Per-sample values of one named term of a composite loss, as computed by
/// the most recent call to [`LossFunction::compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossComponent {
    pub name: String,
    pub per_sample: Vec<f32>,
}

impl LossComponent {
    pub fn new(name: impl Into<String>, per_sample: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            per_sample,
        }
    }
}

/// A loss function: `(output, targets) -> scalar loss`.
pub trait LossFunction<T: Tensor>: std::fmt::Debug {
    /// Computes the loss of a batch. The returned tensor must still be
    /// attached to the graph so that it can be back-propagated.
    fn compute(&mut self, output: &T, targets: &Targets<T>) -> Result<T, LearnError>;

    /// Named per-sample loss terms of the last `compute` call, in a stable
    /// order. Simple losses expose none.
    fn components(&self) -> Vec<LossComponent> {
        Vec::new()
    }
}
