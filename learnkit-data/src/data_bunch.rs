// learnkit-data/src/data_bunch.rs

use crate::batch_source::{BatchSource, InMemoryBatches};
use learnkit_core::{Batch, Device, Tensor};

/// The data a learner trains on: a training source, optional validation and
/// test sources, and the device batches are expected on.
pub struct DataBunch<T: Tensor> {
    pub train_dl: Box<dyn BatchSource<T>>,
    pub valid_dl: Option<Box<dyn BatchSource<T>>>,
    pub test_dl: Option<Box<dyn BatchSource<T>>>,
    pub device: Device,
}

impl<T: Tensor> DataBunch<T> {
    pub fn new(train_dl: Box<dyn BatchSource<T>>) -> Self {
        Self {
            train_dl,
            valid_dl: None,
            test_dl: None,
            device: Device::default(),
        }
    }

    /// Shorthand for in-memory batches.
    pub fn from_batches(train: Vec<Batch<T>>, valid: Option<Vec<Batch<T>>>) -> Self {
        let bunch = Self::new(Box::new(InMemoryBatches::new(train)));
        match valid {
            Some(valid) => bunch.with_valid(Box::new(InMemoryBatches::new(valid))),
            None => bunch,
        }
    }

    pub fn with_valid(mut self, valid_dl: Box<dyn BatchSource<T>>) -> Self {
        self.valid_dl = Some(valid_dl);
        self
    }

    pub fn with_test(mut self, test_dl: Box<dyn BatchSource<T>>) -> Self {
        self.test_dl = Some(test_dl);
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn train_dl(&self) -> &dyn BatchSource<T> {
        self.train_dl.as_ref()
    }

    pub fn valid_dl(&self) -> Option<&dyn BatchSource<T>> {
        self.valid_dl.as_deref()
    }

    pub fn test_dl(&self) -> Option<&dyn BatchSource<T>> {
        self.test_dl.as_deref()
    }
}

impl<T: Tensor> std::fmt::Debug for DataBunch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBunch")
            .field("train_batches", &self.train_dl.len())
            .field("valid_batches", &self.valid_dl.as_ref().map(|dl| dl.len()))
            .field("test_batches", &self.test_dl.as_ref().map(|dl| dl.len()))
            .field("device", &self.device)
            .finish()
    }
}
