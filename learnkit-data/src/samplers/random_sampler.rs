// learnkit-data/src/samplers/random_sampler.rs

use super::traits::Sampler;
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};

/// A sampler that shuffles dataset indices on every pass.
///
/// With a seed, the sequence of passes is reproducible: pass `k` uses the
/// seed `seed + k`.
#[derive(Debug)]
pub struct RandomSampler {
    replacement: bool,
    num_samples: Option<usize>,
    seed: Option<u64>,
    passes: AtomicU64,
}

impl RandomSampler {
    /// Creates a new `RandomSampler`.
    ///
    /// # Arguments
    ///
    /// * `replacement`: If `true`, an index can be selected multiple times.
    /// * `num_samples`: Number of samples to draw per pass. Defaults to the
    ///   dataset size.
    pub fn new(replacement: bool, num_samples: Option<usize>) -> Self {
        RandomSampler {
            replacement,
            num_samples,
            seed: None,
            passes: AtomicU64::new(0),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst);
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(pass)),
            None => StdRng::from_entropy(),
        }
    }
}

impl Clone for RandomSampler {
    fn clone(&self) -> Self {
        Self {
            replacement: self.replacement,
            num_samples: self.num_samples,
            seed: self.seed,
            passes: AtomicU64::new(self.passes.load(Ordering::SeqCst)),
        }
    }
}

impl Sampler for RandomSampler {
    fn iter(&self, dataset_len: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync> {
        if dataset_len == 0 {
            return Box::new(std::iter::empty());
        }

        let mut rng = self.rng();
        let actual_num_samples = self.num_samples.unwrap_or(dataset_len);

        if self.replacement {
            let indices: Vec<usize> = (0..actual_num_samples)
                .map(|_| rng.gen_range(0..dataset_len))
                .collect();
            Box::new(indices.into_iter())
        } else {
            if actual_num_samples > dataset_len {
                warn!(
                    "RandomSampler: num_samples ({}) > dataset_len ({}) without replacement, yielding nothing",
                    actual_num_samples, dataset_len
                );
                return Box::new(std::iter::empty());
            }
            let mut indices: Vec<usize> = (0..dataset_len).collect();
            indices.shuffle(&mut rng);
            indices.truncate(actual_num_samples);
            Box::new(indices.into_iter())
        }
    }

    fn len(&self, dataset_len: usize) -> usize {
        let n = self.num_samples.unwrap_or(dataset_len);
        if dataset_len == 0 || (!self.replacement && n > dataset_len) {
            0
        } else {
            n
        }
    }
}

#[cfg(test)]
#[path = "random_sampler_test.rs"]
mod tests;
