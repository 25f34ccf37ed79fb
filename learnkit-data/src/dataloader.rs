// learnkit-data/src/dataloader.rs

//! # DataLoader
//!
//! Groups dataset samples into batches. The order of samples is decided by a
//! [`Sampler`], and a collate function turns each list of samples into a
//! [`Batch`]. Unlike a plain iterator, a `DataLoader` can be walked any
//! number of times: every call to [`DataLoader::iter`] (or
//! [`BatchSource::batches`]) starts a new pass and asks the sampler for a
//! fresh index order.
//!
//! ```rust
//! use learnkit_core::utils::testing::MockTensor;
//! use learnkit_core::Batch;
//! use learnkit_data::{BatchSource, DataLoader, SequentialSampler, VecDataset};
//!
//! let dataset = VecDataset::new(vec![(1.0f32, 0.0f32), (2.0, 0.0), (3.0, 1.0)]);
//! let loader = DataLoader::new(
//!     dataset,
//!     2,
//!     SequentialSampler::new(),
//!     false,
//!     Box::new(|samples: Vec<(f32, f32)>| {
//!         let n = samples.len();
//!         let (x, y): (Vec<f32>, Vec<f32>) = samples.into_iter().unzip();
//!         Ok(Batch::from_pair(MockTensor::new(x, vec![n]), MockTensor::new(y, vec![n])))
//!     }),
//! )
//! .expect("valid loader");
//! assert_eq!(loader.len(), 2);
//! ```

use crate::batch_source::{BatchIter, BatchSource};
use crate::datasets::Dataset;
use crate::samplers::Sampler;
use learnkit_core::{Batch, LearnError, Tensor};
use std::fmt;

/// Turns a list of samples into one batch (stacking is engine specific).
pub type CollateFn<I, T> = Box<dyn Fn(Vec<I>) -> Result<Batch<T>, LearnError> + Send + Sync>;

/// Restartable batching over a dataset.
///
/// # Type Parameters
/// - `D`: The dataset.
/// - `S`: The sampler producing the index order of each pass.
/// - `T`: The tensor type of the collated batches.
pub struct DataLoader<D: Dataset, S: Sampler, T> {
    pub dataset: D,
    pub batch_size: usize,
    pub sampler: S,
    /// Skip the last batch of a pass when it is incomplete.
    pub drop_last: bool,
    collate_fn: CollateFn<D::Item, T>,
}

impl<D: Dataset, S: Sampler, T: Tensor> DataLoader<D, S, T> {
    /// Creates a new loader.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::PreconditionViolation` if `batch_size` is zero.
    pub fn new(
        dataset: D,
        batch_size: usize,
        sampler: S,
        drop_last: bool,
        collate_fn: CollateFn<D::Item, T>,
    ) -> Result<Self, LearnError> {
        if batch_size == 0 {
            return Err(LearnError::PreconditionViolation(
                "DataLoader batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            dataset,
            batch_size,
            sampler,
            drop_last,
            collate_fn,
        })
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&self) -> BatchIter<'_, T> {
        Box::new(LoaderIter {
            loader: self,
            indices: self.sampler.iter(self.dataset.len()),
            done: false,
        })
    }
}

impl<D: Dataset, S: Sampler, T> fmt::Debug for DataLoader<D, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("dataset_len", &self.dataset.len())
            .field("batch_size", &self.batch_size)
            .field("sampler", &self.sampler)
            .field("drop_last", &self.drop_last)
            .finish()
    }
}

impl<D: Dataset, S: Sampler, T: Tensor> BatchSource<T> for DataLoader<D, S, T> {
    fn batches(&self) -> BatchIter<'_, T> {
        self.iter()
    }

    fn len(&self) -> usize {
        let n = self.sampler.len(self.dataset.len());
        if self.drop_last {
            n / self.batch_size
        } else {
            (n + self.batch_size - 1) / self.batch_size
        }
    }
}

struct LoaderIter<'a, D: Dataset, S: Sampler, T> {
    loader: &'a DataLoader<D, S, T>,
    indices: Box<dyn Iterator<Item = usize> + Send + Sync>,
    done: bool,
}

impl<'a, D: Dataset, S: Sampler, T> Iterator for LoaderIter<'a, D, S, T> {
    type Item = Result<Batch<T>, LearnError>;

    /// A failed sample fetch is yielded once and ends the pass.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let batch_size = self.loader.batch_size;
        let mut samples = Vec::with_capacity(batch_size);
        for idx in self.indices.by_ref().take(batch_size) {
            match self.loader.dataset.get(idx) {
                Ok(item) => samples.push(item),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        if samples.is_empty() || (self.loader.drop_last && samples.len() < batch_size) {
            self.done = true;
            return None;
        }
        Some((self.loader.collate_fn)(samples))
    }
}

#[cfg(test)]
#[path = "dataloader_test.rs"]
mod tests;
