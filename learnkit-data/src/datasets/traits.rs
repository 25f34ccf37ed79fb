// learnkit-data/src/datasets/traits.rs

use learnkit_core::LearnError;

/// Represents a dataset that can be accessed by index.
///
/// Items are raw samples; turning a list of samples into a [`Batch`] is the
/// job of the loader's collate function.
///
/// [`Batch`]: learnkit_core::Batch
pub trait Dataset {
    /// The type of a single sample.
    type Item: Send + 'static;

    /// Returns the sample at the given index.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::Data` if the index is out of bounds or the sample
    /// cannot be produced.
    fn get(&self, index: usize) -> Result<Self::Item, LearnError>;

    /// Returns the total number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
