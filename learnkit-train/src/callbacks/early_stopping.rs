//! Early stopping callback.

use super::{Callback, CallbackState};
use learnkit_core::{LearnError, Tensor};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Min,
    Max,
}

/// Quantity watched by [`EarlyStopping`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Monitor {
    ValLoss,
    /// The smoothed training loss.
    TrainLoss,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor: Monitor,
    patience: usize,
    min_delta: f32,
    mode: Mode,
    best: Option<f32>,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new() -> Self {
        Self {
            monitor: Monitor::ValLoss,
            patience: 3,
            min_delta: 0.0,
            mode: Mode::Min,
            best: None,
            epochs_without_improvement: 0,
        }
    }

    pub fn monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn min_delta(mut self, delta: f32) -> Self {
        self.min_delta = delta;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    fn monitored_value(&self, state: &CallbackState) -> Option<f32> {
        match self.monitor {
            Monitor::ValLoss => state.val_loss(),
            Monitor::TrainLoss => state.smooth_loss,
        }
    }

    fn is_improvement(&self, current: f32, best: f32) -> bool {
        match self.mode {
            Mode::Min => current < best - self.min_delta,
            Mode::Max => current > best + self.min_delta,
        }
    }
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tensor> Callback<T> for EarlyStopping {
    fn name(&self) -> &str {
        "EarlyStopping"
    }

    fn on_train_begin(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        self.best = None;
        self.epochs_without_improvement = 0;
        Ok(())
    }

    fn on_epoch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        let Some(current) = self.monitored_value(state) else {
            return Ok(false);
        };

        match self.best {
            Some(best) if !self.is_improvement(current, best) => {
                self.epochs_without_improvement += 1;
                if self.epochs_without_improvement >= self.patience {
                    info!(
                        "Early stopping at epoch {}: no improvement over {:.6} for {} epochs",
                        state.epoch, best, self.epochs_without_improvement
                    );
                    return Ok(true);
                }
            }
            _ => {
                self.best = Some(current);
                self.epochs_without_improvement = 0;
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "early_stopping_test.rs"]
mod tests;
