// learnkit-core/src/batch.rs

use crate::error::LearnError;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key under which a single, unnamed target tensor is stored.
pub const DEFAULT_TARGET_KEY: &str = "target";

/// Training phase a batch belongs to.
///
/// `Val` and `Test` are only distinguished by whether the batch targets carry
/// a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Train,
    Val,
    Test,
}

impl Phase {
    /// Upper-case name used when keying recorded history.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Train => "TRAIN",
            Phase::Val => "VAL",
            Phase::Test => "TEST",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a batch: training batches are `Train`; otherwise a batch whose
/// targets contain `label_key` is `Val`, and anything else is `Test`.
pub fn determine_phase<T>(train: bool, last_target: &Targets<T>, label_key: &str) -> Phase {
    if train {
        Phase::Train
    } else if last_target.get(label_key).is_some() {
        Phase::Val
    } else {
        Phase::Test
    }
}

/// Ordered, named target tensors of a batch.
#[derive(Debug, Clone)]
pub struct Targets<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Targets<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Targets<T> {
    /// Creates an empty target set (the shape of an unlabeled test batch).
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a single tensor, stored under [`DEFAULT_TARGET_KEY`].
    pub fn single(target: T) -> Self {
        Self::new().with(DEFAULT_TARGET_KEY, target)
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, tensor: T) -> Self {
        self.insert(name, tensor);
        self
    }

    /// Inserts a named target. An existing entry with the same name is
    /// replaced in place so the original ordering is kept.
    pub fn insert(&mut self, name: impl Into<String>, tensor: T) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = tensor,
            None => self.entries.push((name, tensor)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Like [`Targets::get`] but reports a missing entry as an error.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::MissingField` if no target is stored under `name`.
    pub fn require(&self, name: &str) -> Result<&T, LearnError> {
        self.get(name).ok_or_else(|| LearnError::MissingField {
            field: name.to_string(),
        })
    }

    /// The first target in insertion order.
    pub fn first(&self) -> Option<&T> {
        self.entries.first().map(|(_, t)| t)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn tensors(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Tensor> Targets<T> {
    /// Detaches every target tensor.
    pub fn detach(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(n, t)| (n.clone(), t.detach()))
                .collect(),
        }
    }
}

/// One batch as produced by a batch source: ordered positional inputs and
/// named targets.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub inputs: Vec<T>,
    pub targets: Targets<T>,
}

impl<T> Batch<T> {
    pub fn new(inputs: Vec<T>, targets: Targets<T>) -> Self {
        Self { inputs, targets }
    }

    /// The common `(x, y)` case: one input tensor and one unnamed target.
    pub fn from_pair(input: T, target: T) -> Self {
        Self::new(vec![input], Targets::single(target))
    }

    /// A batch without any target (e.g. a test set without labels).
    pub fn unlabeled(inputs: Vec<T>) -> Self {
        Self::new(inputs, Targets::new())
    }
}

impl<T: Tensor> Batch<T> {
    /// Number of samples in the batch: the leading dimension of the first
    /// target, or of the first input when there are no targets.
    pub fn size(&self) -> usize {
        self.targets
            .first()
            .or_else(|| self.inputs.first())
            .map(|t| t.batch_size())
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
