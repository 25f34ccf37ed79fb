// Shared helpers for the learnkit-train integration tests.
#![allow(dead_code)]

use learnkit_core::utils::testing::{EventLog, MockLayer, MockLoss, MockModel, MockOptimizer, MockTensor};
use learnkit_core::{Batch, LearnError};
use learnkit_data::DataBunch;
use learnkit_train::{Callback, CallbackState, Learner};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A learner over in-memory batches, a model of `n_layers` plain layers and
/// the given loss.
pub fn learner(
    train: Vec<Batch<MockTensor>>,
    valid: Option<Vec<Batch<MockTensor>>>,
    model: MockModel,
    loss: MockLoss,
) -> Learner<MockTensor> {
    init_logger();
    Learner::new(
        DataBunch::from_batches(train, valid),
        Box::new(model),
        Box::new(loss),
        MockOptimizer::factory(None),
    )
}

/// `n` layers alternating between plain and batch-norm.
pub fn mixed_model(n: usize) -> MockModel {
    MockModel::new(
        (0..n)
            .map(|i| {
                if i % 2 == 1 {
                    MockLayer::batch_norm(format!("bn{}", i)).into_shared()
                } else {
                    MockLayer::new(format!("layer{}", i)).into_shared()
                }
            })
            .collect(),
    )
}

/// Logs batch ends, epoch ends and the train end, and votes to stop where
/// configured.
#[derive(Debug, Default)]
pub struct Probe {
    pub log: EventLog,
    /// 1-based training batch of each epoch at which to vote stop.
    pub stop_on_train_batch: Option<usize>,
    pub stop_on_epoch: Option<usize>,
}

impl Probe {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }
}

impl Callback<MockTensor> for Probe {
    fn on_batch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        self.log.push(format!("batch_end:{}", if state.train { "train" } else { "valid" }));
        Ok(state.train && self.stop_on_train_batch == Some(state.num_batch + 1))
    }

    fn on_epoch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        self.log.push(format!("epoch_end:{:?}", state.val_loss()));
        Ok(self.stop_on_epoch == Some(state.epoch))
    }

    fn on_train_end(&mut self, error: Option<&LearnError>, _state: &CallbackState) -> Result<(), LearnError> {
        match error {
            Some(e) => self.log.push(format!("train_end:{}", e)),
            None => self.log.push("train_end"),
        }
        Ok(())
    }
}
