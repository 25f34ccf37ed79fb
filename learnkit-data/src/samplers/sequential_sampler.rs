// learnkit-data/src/samplers/sequential_sampler.rs

use super::traits::Sampler;

/// Visits dataset indices in order, optionally stopping after the first
/// `num_samples` of them.
///
/// Validation and test loaders use it so that predictions line up with the
/// dataset order on every pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSampler {
    num_samples: Option<usize>,
}

impl SequentialSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits every pass to the first `num_samples` indices.
    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = Some(num_samples);
        self
    }
}

impl Sampler for SequentialSampler {
    fn iter(&self, dataset_len: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync> {
        Box::new(0..self.len(dataset_len))
    }

    fn len(&self, dataset_len: usize) -> usize {
        self.num_samples.map_or(dataset_len, |n| n.min(dataset_len))
    }
}

#[cfg(test)]
#[path = "sequential_sampler_test.rs"]
mod tests;
