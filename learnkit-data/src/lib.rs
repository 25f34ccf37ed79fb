//! Data plumbing for learnkit: datasets, samplers, a restartable
//! [`DataLoader`] and the [`DataBunch`] handed to a learner.

pub mod batch_source;
pub mod data_bunch;
pub mod dataloader;
pub mod datasets;
pub mod samplers;

pub use batch_source::{BatchIter, BatchSource, InMemoryBatches};
pub use data_bunch::DataBunch;
pub use dataloader::{CollateFn, DataLoader};
pub use datasets::{Dataset, VecDataset};
pub use samplers::{RandomSampler, Sampler, SequentialSampler};
