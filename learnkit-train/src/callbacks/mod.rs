// learnkit-train/src/callbacks/mod.rs

//! The callback protocol.
//!
//! A [`Callback`] observes (and may transform) the training loop through a
//! fixed set of lifecycle hooks. Every hook has a no-op default, so a
//! callback only implements the events it cares about. Hooks receive a
//! read-only [`CallbackState`] snapshot maintained by the
//! [`CallbackHandler`](crate::handler::CallbackHandler).
//!
//! Event order for one fit:
//!
//! ```text
//! on_train_begin
//!   on_epoch_begin
//!     on_batch_begin -> on_loss_begin -> on_backward_begin -> on_backward_end
//!       -> on_step_end -> on_batch_end            (training batches)
//!     on_batch_begin -> on_loss_begin -> on_batch_end  (validation batches)
//!   on_epoch_end
//! on_train_end
//! ```

pub mod early_stopping;
pub mod one_cycle;

pub use early_stopping::{EarlyStopping, Mode, Monitor};
pub use one_cycle::{annealing_cos, OneCycleScheduler};

use learnkit_core::{Batch, LearnError, LossComponent, Tensor};

/// Snapshot of the loop passed to every hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackState {
    /// Number of epochs requested for this fit.
    pub n_epochs: usize,
    /// Current epoch, starting at 0. Incremented after `on_epoch_end`.
    pub epoch: usize,
    /// Training batches completed since the beginning of the fit.
    pub iteration: usize,
    /// Training batches completed in the current epoch.
    pub num_batch: usize,
    /// Whether the current batch is a training batch.
    pub train: bool,
    /// Smoothed training loss (bias-corrected moving average).
    pub smooth_loss: Option<f32>,
    /// Loss of the most recent batch.
    pub last_loss: Option<f32>,
    /// Named per-sample loss terms of the most recent batch.
    pub last_components: Vec<LossComponent>,
    /// `[val_loss, metric_1, ...]`, set at epoch end when a validation loss
    /// exists.
    pub last_metrics: Option<Vec<f32>>,
    pub metrics_names: Vec<String>,
}

impl CallbackState {
    /// Validation loss of the epoch that just ended, if any.
    pub fn val_loss(&self) -> Option<f32> {
        self.last_metrics.as_ref().and_then(|m| m.first().copied())
    }
}

/// Lifecycle hooks of the training loop.
///
/// Transforming hooks (`on_batch_begin`, `on_loss_begin`,
/// `on_backward_begin`) are chained: each callback receives the value
/// returned by the previous one. `on_batch_end` and `on_epoch_end` return a
/// stop vote; the loop stops if any callback votes `true`.
pub trait Callback<T: Tensor> {
    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Sort key; callbacks with a lower order run first. Ties keep
    /// registration order.
    fn order(&self) -> i32 {
        0
    }

    fn on_train_begin(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        Ok(())
    }

    fn on_batch_begin(&mut self, batch: Batch<T>, _state: &CallbackState) -> Result<Batch<T>, LearnError> {
        Ok(batch)
    }

    fn on_loss_begin(&mut self, output: T, _state: &CallbackState) -> Result<T, LearnError> {
        Ok(output)
    }

    fn on_backward_begin(&mut self, loss: T, _state: &CallbackState) -> Result<T, LearnError> {
        Ok(loss)
    }

    fn on_backward_end(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        Ok(())
    }

    fn on_step_end(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        Ok(())
    }

    /// Called after every batch; the batch loss is in `state.last_loss`.
    fn on_batch_end(&mut self, _state: &CallbackState) -> Result<bool, LearnError> {
        Ok(false)
    }

    /// Called after validation; `state.last_metrics` holds the epoch's
    /// validation loss and metrics.
    fn on_epoch_end(&mut self, _state: &CallbackState) -> Result<bool, LearnError> {
        Ok(false)
    }

    /// Called exactly once per fit, on every exit path. `error` is the
    /// failure that aborted the loop, if any.
    fn on_train_end(&mut self, _error: Option<&LearnError>, _state: &CallbackState) -> Result<(), LearnError> {
        Ok(())
    }
}
