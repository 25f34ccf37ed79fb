// learnkit-train/src/handler.rs

//! Event dispatch for the training loop.
//!
//! [`CallbackHandler`] borrows the callbacks of one fit (or predict) call,
//! sorts them once by [`Callback::order`], and forwards every loop event to
//! them in that order. It also maintains the [`CallbackState`] snapshot, the
//! smoothed training loss and the per-epoch metric averages.

use crate::callbacks::{Callback, CallbackState};
use learnkit_core::{Batch, LearnError, LossComponent, Metric, Targets, Tensor};
use log::{debug, warn};

/// Default smoothing factor of the training loss.
pub const DEFAULT_SMOOTH_BETA: f32 = 0.98;

/// Exponentially weighted moving average with bias correction.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothenValue {
    beta: f32,
    n: i32,
    mov_avg: f32,
    smooth: f32,
}

impl SmoothenValue {
    pub fn new(beta: f32) -> Self {
        Self {
            beta,
            n: 0,
            mov_avg: 0.0,
            smooth: 0.0,
        }
    }

    pub fn add_value(&mut self, value: f32) {
        self.n = self.n.saturating_add(1);
        self.mov_avg = self.beta * self.mov_avg + (1.0 - self.beta) * value;
        self.smooth = self.mov_avg / (1.0 - self.beta.powi(self.n));
    }

    /// The smoothed value, `None` before the first sample.
    pub fn smooth(&self) -> Option<f32> {
        (self.n > 0).then_some(self.smooth)
    }
}

/// Averages a metric over the batches of an epoch, weighted by batch size.
#[derive(Debug)]
pub struct AverageMetric<'a, T: Tensor> {
    metric: &'a dyn Metric<T>,
    total: f32,
    count: usize,
}

impl<'a, T: Tensor> AverageMetric<'a, T> {
    pub fn new(metric: &'a dyn Metric<T>) -> Self {
        Self {
            metric,
            total: 0.0,
            count: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.metric.name()
    }

    pub fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }

    pub fn accumulate(&mut self, output: &T, targets: &Targets<T>, size: usize) -> Result<(), LearnError> {
        let value = self.metric.compute(output, targets)?;
        self.total += value * size as f32;
        self.count += size;
        Ok(())
    }

    /// Weighted mean of the values seen since the last reset.
    pub fn value(&self) -> Option<f32> {
        (self.count > 0).then(|| self.total / self.count as f32)
    }
}

/// Dispatches loop events to an ordered list of borrowed callbacks.
pub struct CallbackHandler<'a, T: Tensor> {
    callbacks: Vec<&'a mut dyn Callback<T>>,
    metrics: Vec<AverageMetric<'a, T>>,
    smoothener: SmoothenValue,
    state: CallbackState,
    last_output: Option<T>,
    last_target: Option<Targets<T>>,
    last_size: usize,
}

impl<'a, T: Tensor> CallbackHandler<'a, T> {
    /// Creates a handler. Callbacks are sorted once, by `order()`, with a
    /// stable sort.
    pub fn new(mut callbacks: Vec<&'a mut dyn Callback<T>>, metrics: Vec<&'a dyn Metric<T>>) -> Self {
        callbacks.sort_by_key(|cb| cb.order());
        let state = CallbackState {
            metrics_names: metrics.iter().map(|m| m.name().to_string()).collect(),
            ..CallbackState::default()
        };
        Self {
            callbacks,
            metrics: metrics.into_iter().map(AverageMetric::new).collect(),
            smoothener: SmoothenValue::new(DEFAULT_SMOOTH_BETA),
            state,
            last_output: None,
            last_target: None,
            last_size: 0,
        }
    }

    /// A handler without callbacks or metrics.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn with_smooth_beta(mut self, beta: f32) -> Self {
        self.smoothener = SmoothenValue::new(beta);
        self
    }

    pub fn state(&self) -> &CallbackState {
        &self.state
    }

    /// Callback names in dispatch order.
    pub fn callback_names(&self) -> Vec<String> {
        self.callbacks.iter().map(|cb| cb.name().to_string()).collect()
    }

    fn dispatch(
        &mut self,
        mut hook: impl FnMut(&mut dyn Callback<T>, &CallbackState) -> Result<(), LearnError>,
    ) -> Result<(), LearnError> {
        for cb in self.callbacks.iter_mut() {
            hook(&mut **cb, &self.state)?;
        }
        Ok(())
    }

    /// Every callback votes; none is skipped once another voted to stop.
    fn vote(
        &mut self,
        mut hook: impl FnMut(&mut dyn Callback<T>, &CallbackState) -> Result<bool, LearnError>,
    ) -> Result<bool, LearnError> {
        let mut stop = false;
        for cb in self.callbacks.iter_mut() {
            let vote = hook(&mut **cb, &self.state)?;
            if vote {
                debug!("{} requested a stop", cb.name());
            }
            stop |= vote;
        }
        Ok(stop)
    }

    pub fn on_train_begin(&mut self, epochs: usize) -> Result<(), LearnError> {
        self.state.n_epochs = epochs;
        self.state.epoch = 0;
        self.state.iteration = 0;
        self.state.num_batch = 0;
        self.state.smooth_loss = None;
        self.state.last_loss = None;
        self.state.last_metrics = None;
        debug!(
            "Training for {} epochs with callbacks {:?}",
            epochs,
            self.callback_names()
        );
        self.dispatch(|cb, s| cb.on_train_begin(s))
    }

    pub fn on_epoch_begin(&mut self) -> Result<(), LearnError> {
        self.state.num_batch = 0;
        self.state.last_metrics = None;
        for metric in self.metrics.iter_mut() {
            metric.reset();
        }
        self.dispatch(|cb, s| cb.on_epoch_begin(s))
    }

    /// Chains the batch through every callback and remembers the resulting
    /// targets for metric computation.
    pub fn on_batch_begin(&mut self, batch: Batch<T>, train: bool) -> Result<Batch<T>, LearnError> {
        self.state.train = train;
        self.state.last_components.clear();
        self.last_output = None;
        let mut batch = batch;
        for cb in self.callbacks.iter_mut() {
            batch = cb.on_batch_begin(batch, &self.state)?;
        }
        self.last_size = batch.size();
        self.last_target = Some(batch.targets.clone());
        Ok(batch)
    }

    pub fn on_loss_begin(&mut self, output: T) -> Result<T, LearnError> {
        let mut output = output;
        for cb in self.callbacks.iter_mut() {
            output = cb.on_loss_begin(output, &self.state)?;
        }
        self.last_output = Some(output.clone());
        Ok(output)
    }

    /// Updates the smoothed loss, then chains the loss through every
    /// callback.
    pub fn on_backward_begin(&mut self, loss: T) -> Result<T, LearnError> {
        let value = loss.item()?;
        self.smoothener.add_value(value);
        self.state.last_loss = Some(value);
        self.state.smooth_loss = self.smoothener.smooth();
        let mut loss = loss;
        for cb in self.callbacks.iter_mut() {
            loss = cb.on_backward_begin(loss, &self.state)?;
        }
        Ok(loss)
    }

    pub fn on_backward_end(&mut self) -> Result<(), LearnError> {
        self.dispatch(|cb, s| cb.on_backward_end(s))
    }

    pub fn on_step_end(&mut self) -> Result<(), LearnError> {
        self.dispatch(|cb, s| cb.on_step_end(s))
    }

    /// Stores the named loss terms of the current batch.
    pub fn set_last_components(&mut self, components: Vec<LossComponent>) {
        self.state.last_components = components;
    }

    /// Feeds the metrics on validation batches, then collects stop votes.
    ///
    /// # Returns
    ///
    /// `true` if at least one callback asked to stop.
    pub fn on_batch_end(&mut self, loss: f32) -> Result<bool, LearnError> {
        self.state.last_loss = Some(loss);
        if !self.state.train && !self.metrics.is_empty() {
            match (&self.last_output, &self.last_target) {
                (Some(output), Some(targets)) => {
                    for metric in self.metrics.iter_mut() {
                        metric.accumulate(output, targets, self.last_size)?;
                    }
                }
                _ => {
                    return Err(LearnError::InternalError(
                        "on_batch_end called before on_batch_begin/on_loss_begin".to_string(),
                    ))
                }
            }
        }
        let stop = self.vote(|cb, s| cb.on_batch_end(s))?;
        if self.state.train {
            self.state.iteration += 1;
            self.state.num_batch += 1;
        }
        Ok(stop)
    }

    /// Finalizes the epoch's metrics and collects stop votes.
    ///
    /// `last_metrics` becomes `[val_loss, metric_1, ...]` when a validation
    /// loss exists and `None` otherwise.
    pub fn on_epoch_end(&mut self, val_loss: Option<f32>) -> Result<bool, LearnError> {
        self.state.last_metrics = match val_loss {
            Some(val_loss) => {
                let mut last_metrics = Vec::with_capacity(1 + self.metrics.len());
                last_metrics.push(val_loss);
                for metric in &self.metrics {
                    let value = metric.value().unwrap_or_else(|| {
                        warn!("Metric '{}' saw no samples this epoch", metric.name());
                        f32::NAN
                    });
                    last_metrics.push(value);
                }
                Some(last_metrics)
            }
            None => None,
        };
        let stop = self.vote(|cb, s| cb.on_epoch_end(s))?;
        self.state.epoch += 1;
        Ok(stop)
    }

    /// Calls every callback's `on_train_end`, even after a failure, and
    /// reports the first failure as `LearnError::Callback` naming the
    /// callback that raised it.
    pub fn on_train_end(&mut self, error: Option<&LearnError>) -> Result<(), LearnError> {
        let mut first_error = None;
        for cb in self.callbacks.iter_mut() {
            if let Err(e) = cb.on_train_end(error, &self.state) {
                warn!("{} failed in on_train_end: {}", cb.name(), e);
                first_error.get_or_insert(LearnError::Callback {
                    name: cb.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<'a, T: Tensor> std::fmt::Debug for CallbackHandler<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandler")
            .field("callbacks", &self.callback_names())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod tests;
