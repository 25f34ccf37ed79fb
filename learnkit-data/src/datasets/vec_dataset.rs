use super::traits::Dataset;
use learnkit_core::LearnError;

/// A dataset backed by a `Vec` of samples.
#[derive(Debug, Clone)]
pub struct VecDataset<I: Clone + Send + 'static> {
    data: Vec<I>,
}

impl<I: Clone + Send + 'static> VecDataset<I> {
    pub fn new(data: Vec<I>) -> Self {
        Self { data }
    }
}

impl<I: Clone + Send + 'static> Dataset for VecDataset<I> {
    type Item = I;

    /// Clones the sample at `index`.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::Data` if the index is out of bounds.
    fn get(&self, index: usize) -> Result<Self::Item, LearnError> {
        self.data.get(index).cloned().ok_or_else(|| {
            LearnError::Data(format!(
                "index {} out of bounds for dataset of length {}",
                index,
                self.data.len()
            ))
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
#[path = "vec_dataset_test.rs"]
mod tests;
