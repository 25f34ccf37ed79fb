// learnkit-data/src/samplers/traits.rs

use std::fmt::Debug;

/// Decides the order in which a [`DataLoader`](crate::DataLoader) visits
/// dataset indices.
///
/// `iter` is called once per pass, so a shuffling sampler reshuffles every
/// epoch.
pub trait Sampler: Debug + Send + Sync {
    /// Returns a fresh iterator over dataset indices.
    ///
    /// # Arguments
    ///
    /// * `dataset_len` - The total number of items in the dataset.
    fn iter(&self, dataset_len: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync>;

    /// Number of indices a pass will yield for a dataset of `dataset_len`
    /// items.
    fn len(&self, dataset_len: usize) -> usize;
}
