// learnkit-data/src/batch_source.rs

use learnkit_core::{Batch, LearnError, Tensor};

/// One pass over a batch source.
pub type BatchIter<'a, T> = Box<dyn Iterator<Item = Result<Batch<T>, LearnError>> + 'a>;

/// A finite, restartable sequence of batches.
///
/// The training loop calls [`BatchSource::batches`] once per epoch, so every
/// call must start a fresh pass from the beginning.
pub trait BatchSource<T: Tensor> {
    /// Starts a new pass over the source.
    fn batches(&self) -> BatchIter<'_, T>;

    /// Number of batches a pass yields.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pre-collated batches held in memory.
///
/// An entry may also be an error, which is yielded at its position on every
/// pass; this is how a failing loader is simulated.
#[derive(Debug, Clone)]
pub struct InMemoryBatches<T> {
    items: Vec<Result<Batch<T>, LearnError>>,
}

impl<T: Tensor> InMemoryBatches<T> {
    pub fn new(batches: Vec<Batch<T>>) -> Self {
        Self {
            items: batches.into_iter().map(Ok).collect(),
        }
    }

    pub fn push(&mut self, batch: Batch<T>) {
        self.items.push(Ok(batch));
    }

    /// Inserts a failure so that the `index`-th item of every pass is `error`.
    /// An index past the end appends the failure.
    pub fn failing_at(mut self, index: usize, error: LearnError) -> Self {
        let index = index.min(self.items.len());
        self.items.insert(index, Err(error));
        self
    }
}

impl<T: Tensor> BatchSource<T> for InMemoryBatches<T> {
    fn batches(&self) -> BatchIter<'_, T> {
        Box::new(self.items.iter().cloned())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T: Tensor> From<Vec<Batch<T>>> for InMemoryBatches<T> {
    fn from(batches: Vec<Batch<T>>) -> Self {
        Self::new(batches)
    }
}

#[cfg(test)]
#[path = "batch_source_test.rs"]
mod tests;
