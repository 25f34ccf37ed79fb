// learnkit-train/src/recorder.rs

//! Recording callbacks.
//!
//! [`BaseRecorder`] keeps flat, per-iteration and per-epoch series (learning
//! rates, momentums, smoothed losses, validation losses and metric rows) and
//! writes one stats table line per epoch to the log. [`Recorder`] adds
//! loss-component and metric histories keyed by `(phase, epoch)`.

use crate::callbacks::{Callback, CallbackState};
use crate::history::{History, HistoryKey};
use learnkit_core::optim::read_optimizer;
use learnkit_core::{determine_phase, Batch, LearnError, Phase, SharedOptimizer, Tensor};
use log::info;

/// Sort key of the recorders: they run before every default callback.
pub const RECORDER_ORDER: i32 = -10;

#[derive(Debug, Default)]
pub struct BaseRecorder {
    opt: Option<SharedOptimizer>,
    pub names: Vec<String>,
    pub lrs: Vec<f32>,
    pub moms: Vec<f32>,
    /// Smoothed training loss, one value per training batch.
    pub losses: Vec<f32>,
    pub val_losses: Vec<f32>,
    /// Metric row (without the validation loss) of every validated epoch.
    pub metrics: Vec<Vec<f32>>,
    /// Training batches of every epoch.
    pub nb_batches: Vec<usize>,
    added_metric_names: Vec<String>,
    added_metrics: Vec<f32>,
}

impl BaseRecorder {
    pub fn new(opt: Option<SharedOptimizer>) -> Self {
        Self {
            opt,
            ..Self::default()
        }
    }

    /// Extra metric columns, appended after the handler's metrics.
    pub fn add_metric_names(&mut self, names: Vec<String>) {
        self.added_metric_names = names;
    }

    /// Values of the extra metric columns for the next epoch row.
    pub fn add_metrics(&mut self, metrics: Vec<f32>) {
        self.added_metrics = metrics;
    }

    /// Names of the metric columns (everything after `valid_loss`).
    pub fn metric_names(&self) -> &[String] {
        self.names.get(3..).unwrap_or(&[])
    }

    fn trimmed<V>(values: &[V], skip_start: usize, skip_end: usize) -> &[V] {
        let end = values.len().saturating_sub(skip_end);
        values.get(skip_start..end).unwrap_or(&[])
    }

    /// Recorded smoothed losses without the first `skip_start` and last
    /// `skip_end` iterations.
    pub fn losses_between(&self, skip_start: usize, skip_end: usize) -> &[f32] {
        Self::trimmed(&self.losses, skip_start, skip_end)
    }

    pub fn lrs_between(&self, skip_start: usize, skip_end: usize) -> &[f32] {
        Self::trimmed(&self.lrs, skip_start, skip_end)
    }

    /// Iteration count at the end of each epoch, the x-axis of the
    /// validation losses.
    pub fn validation_iterations(&self) -> Vec<usize> {
        self.nb_batches
            .iter()
            .scan(0, |total, n| {
                *total += n;
                Some(*total)
            })
            .collect()
    }

    /// Renders one table line, each value padded to its column name.
    pub fn format_stats(&self, epoch: usize, values: &[f32]) -> String {
        let cells = std::iter::once(epoch.to_string()).chain(values.iter().map(|v| format!("{:.6}", v)));
        self.names
            .iter()
            .zip(cells)
            .map(|(name, cell)| format!("{:<width$}", cell, width = name.len()))
            .collect::<Vec<_>>()
            .join("  ")
    }

    fn restart(&mut self, opt: Option<SharedOptimizer>) {
        *self = Self {
            opt,
            added_metric_names: std::mem::take(&mut self.added_metric_names),
            added_metrics: std::mem::take(&mut self.added_metrics),
            ..Self::default()
        };
    }

    fn train_begin(&mut self, state: &CallbackState) {
        self.names = ["epoch", "train_loss", "valid_loss"]
            .iter()
            .map(|s| s.to_string())
            .chain(state.metrics_names.iter().cloned())
            .chain(self.added_metric_names.iter().cloned())
            .collect();
        info!("{}", self.names.join("  "));
        self.lrs.clear();
        self.moms.clear();
        self.losses.clear();
        self.val_losses.clear();
        self.metrics.clear();
        self.nb_batches.clear();
    }

    fn batch_begin(&mut self, state: &CallbackState) -> Result<(), LearnError> {
        if let (true, Some(opt)) = (state.train, &self.opt) {
            let opt = read_optimizer(opt)?;
            self.lrs.push(opt.lr());
            self.moms.push(opt.mom());
        }
        Ok(())
    }

    fn backward_begin(&mut self, state: &CallbackState) {
        if let Some(smooth_loss) = state.smooth_loss {
            self.losses.push(smooth_loss);
        }
    }

    /// Returns the metric row recorded for this epoch, if any.
    fn epoch_end(&mut self, state: &CallbackState) -> Option<Vec<f32>> {
        self.nb_batches.push(state.num_batch);
        let smooth_loss = state.smooth_loss.unwrap_or(f32::NAN);
        match &state.last_metrics {
            Some(last_metrics) => {
                self.val_losses.extend(last_metrics.first().copied());
                let row: Vec<f32> = last_metrics
                    .iter()
                    .skip(1)
                    .chain(self.added_metrics.iter())
                    .copied()
                    .collect();
                let mut stats = vec![smooth_loss];
                stats.extend_from_slice(last_metrics);
                stats.extend_from_slice(&self.added_metrics);
                info!("{}", self.format_stats(state.epoch, &stats));
                if row.is_empty() {
                    None
                } else {
                    self.metrics.push(row.clone());
                    Some(row)
                }
            }
            None => {
                info!("{}", self.format_stats(state.epoch, &[smooth_loss]));
                None
            }
        }
    }
}

impl<T: Tensor> Callback<T> for BaseRecorder {
    fn name(&self) -> &str {
        "BaseRecorder"
    }

    fn order(&self) -> i32 {
        RECORDER_ORDER
    }

    fn on_train_begin(&mut self, state: &CallbackState) -> Result<(), LearnError> {
        self.train_begin(state);
        Ok(())
    }

    fn on_batch_begin(&mut self, batch: Batch<T>, state: &CallbackState) -> Result<Batch<T>, LearnError> {
        self.batch_begin(state)?;
        Ok(batch)
    }

    fn on_backward_begin(&mut self, loss: T, state: &CallbackState) -> Result<T, LearnError> {
        self.backward_begin(state);
        Ok(loss)
    }

    fn on_epoch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        self.epoch_end(state);
        Ok(false)
    }
}

/// A [`BaseRecorder`] that also keeps per-phase, per-epoch histories of the
/// named loss components and of the validation metrics.
#[derive(Debug)]
pub struct Recorder {
    base: BaseRecorder,
    label_key: String,
    phase: Option<Phase>,
    key: Option<HistoryKey>,
    loss_history: History,
    metric_history: History,
}

impl Recorder {
    pub fn new(opt: Option<SharedOptimizer>, label_key: impl Into<String>) -> Self {
        Self {
            base: BaseRecorder::new(opt),
            label_key: label_key.into(),
            phase: None,
            key: None,
            loss_history: History::new(),
            metric_history: History::new(),
        }
    }

    /// Clears every recorded series and attaches a new optimizer. Extra
    /// metric columns registered through `add_metric_names` are kept.
    pub fn restart(&mut self, opt: Option<SharedOptimizer>) {
        self.base.restart(opt);
        self.phase = None;
        self.key = None;
        self.loss_history = History::new();
        self.metric_history = History::new();
    }

    pub fn base(&self) -> &BaseRecorder {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BaseRecorder {
        &mut self.base
    }

    /// Phase of the most recent batch.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn loss_history(&self) -> &History {
        &self.loss_history
    }

    pub fn metric_history(&self) -> &History {
        &self.metric_history
    }

    /// Loss and metric histories in one view.
    pub fn history(&self) -> History {
        self.loss_history.merged(&self.metric_history)
    }

    /// The merged history as pretty-printed JSON.
    pub fn history_json(&self) -> Result<String, LearnError> {
        serde_json::to_string_pretty(&self.history()).map_err(|e| LearnError::Serialization(e.to_string()))
    }

    fn current_key(&self) -> Result<HistoryKey, LearnError> {
        self.key.ok_or_else(|| {
            LearnError::InternalError("recorder received a batch end before any batch begin".to_string())
        })
    }
}

impl<T: Tensor> Callback<T> for Recorder {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn order(&self) -> i32 {
        RECORDER_ORDER
    }

    fn on_train_begin(&mut self, state: &CallbackState) -> Result<(), LearnError> {
        self.base.train_begin(state);
        Ok(())
    }

    fn on_batch_begin(&mut self, batch: Batch<T>, state: &CallbackState) -> Result<Batch<T>, LearnError> {
        self.base.batch_begin(state)?;
        let phase = determine_phase(state.train, &batch.targets, &self.label_key);
        self.phase = Some(phase);
        self.key = Some(HistoryKey::new(phase, state.epoch));
        Ok(batch)
    }

    fn on_backward_begin(&mut self, loss: T, state: &CallbackState) -> Result<T, LearnError> {
        self.base.backward_begin(state);
        Ok(loss)
    }

    /// Appends the per-sample values of every named loss component.
    fn on_batch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        if state.last_components.is_empty() {
            return Ok(false);
        }
        let key = self.current_key()?;
        for component in &state.last_components {
            if self.base.metric_names().contains(&component.name) {
                return Err(LearnError::HistoryNameCollision(component.name.clone()));
            }
            self.loss_history.extend(key, &component.name, &component.per_sample);
        }
        Ok(false)
    }

    /// Records the epoch's metric row when the epoch ended on validation
    /// batches.
    fn on_epoch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        let row = self.base.epoch_end(state);
        if let (Some(Phase::Val), Some(row)) = (self.phase, row) {
            let key = self.current_key()?;
            let names = self.base.metric_names().to_vec();
            for (name, value) in names.iter().zip(row) {
                if self.loss_history.contains_name(name) {
                    return Err(LearnError::HistoryNameCollision(name.clone()));
                }
                self.metric_history.push(key, name, value);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod tests;
