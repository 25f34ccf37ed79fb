// learnkit-train/src/basic_train.rs

//! The training loop: [`loss_batch`] for one batch, [`validate`] for a
//! validation pass and [`fit`] for the epoch driver.

use crate::handler::CallbackHandler;
use learnkit_core::optim::write_optimizer;
use learnkit_core::{Batch, LearnError, LossFunction, Model, SharedOptimizer, Tensor};
use learnkit_data::{BatchSource, DataBunch};
use log::{debug, warn};

/// Result of [`loss_batch`].
#[derive(Debug, Clone)]
pub enum BatchOutput<T> {
    /// The detached batch loss.
    Loss(T),
    /// Detached model output and first target, when no loss function was
    /// given.
    Prediction { output: T, target: Option<T> },
}

impl<T: Tensor> BatchOutput<T> {
    /// The scalar loss value.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::InternalError` for a `Prediction`.
    pub fn loss_value(&self) -> Result<f32, LearnError> {
        match self {
            BatchOutput::Loss(loss) => loss.item(),
            BatchOutput::Prediction { .. } => Err(LearnError::InternalError(
                "batch was run without a loss function".to_string(),
            )),
        }
    }
}

/// Why a fit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every requested epoch ran.
    Completed,
    /// A callback voted to stop at the end of `epoch`.
    CallbackStop { epoch: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOutcome {
    pub epochs_completed: usize,
    pub termination: Termination,
}

/// Runs the model on one batch and, with an optimizer, takes one step.
///
/// The batch is expected to have gone through `on_batch_begin` already.
///
/// # Arguments
///
/// * `model`: The model to run.
/// * `batch`: Inputs and targets.
/// * `loss_func`: Without it, the detached output is returned as a
///   prediction.
/// * `opt`: Without it, no backward pass or step happens (validation).
/// * `handler`: Receives the batch events.
pub fn loss_batch<T: Tensor>(
    model: &dyn Model<T>,
    batch: &Batch<T>,
    loss_func: Option<&mut dyn LossFunction<T>>,
    opt: Option<&SharedOptimizer>,
    handler: &mut CallbackHandler<'_, T>,
) -> Result<BatchOutput<T>, LearnError> {
    let output = model.forward(&batch.inputs)?;
    let output = handler.on_loss_begin(output)?;

    let Some(loss_func) = loss_func else {
        return Ok(BatchOutput::Prediction {
            output: output.detach(),
            target: batch.targets.first().map(|t| t.detach()),
        });
    };
    let mut loss = loss_func.compute(&output, &batch.targets)?;
    handler.set_last_components(loss_func.components());

    if let Some(opt) = opt {
        loss = handler.on_backward_begin(loss)?;
        loss.backward()?;
        handler.on_backward_end()?;
        write_optimizer(opt)?.step()?;
        handler.on_step_end()?;
        write_optimizer(opt)?.zero_grad();
    }

    Ok(BatchOutput::Loss(loss.detach()))
}

/// Per-batch `(loss, batch size)` of a validation pass.
///
/// The model is put in eval mode and gradient recording is disabled for
/// the pass, then re-enabled on every exit path. A stop vote from
/// `on_batch_end` ends the pass early, as does `n_batch`.
pub fn validate_batches<T: Tensor>(
    model: &mut dyn Model<T>,
    dl: &dyn BatchSource<T>,
    loss_func: &mut dyn LossFunction<T>,
    handler: &mut CallbackHandler<'_, T>,
    n_batch: Option<usize>,
) -> Result<Vec<(f32, usize)>, LearnError> {
    model.eval();
    model.set_grad_enabled(false);
    let result = run_validation(&*model, dl, loss_func, handler, n_batch);
    model.set_grad_enabled(true);
    result
}

fn run_validation<T: Tensor>(
    model: &dyn Model<T>,
    dl: &dyn BatchSource<T>,
    loss_func: &mut dyn LossFunction<T>,
    handler: &mut CallbackHandler<'_, T>,
    n_batch: Option<usize>,
) -> Result<Vec<(f32, usize)>, LearnError> {
    let mut results = Vec::new();
    for batch in dl.batches() {
        let batch = handler.on_batch_begin(batch?, false)?;
        let lf: &mut dyn LossFunction<T> = &mut *loss_func;
        let loss = loss_batch(model, &batch, Some(lf), None, handler)?.loss_value()?;
        results.push((loss, batch.size()));
        if handler.on_batch_end(loss)? {
            break;
        }
        if n_batch.is_some_and(|n| results.len() >= n) {
            break;
        }
    }
    Ok(results)
}

/// Size-weighted mean validation loss, `Σ lᵢ·sᵢ / Σ sᵢ`.
///
/// Returns `None` when the pass saw no batch (or only empty ones).
pub fn validate<T: Tensor>(
    model: &mut dyn Model<T>,
    dl: &dyn BatchSource<T>,
    loss_func: &mut dyn LossFunction<T>,
    handler: &mut CallbackHandler<'_, T>,
    n_batch: Option<usize>,
) -> Result<Option<f32>, LearnError> {
    let results = validate_batches(model, dl, loss_func, handler, n_batch)?;
    Ok(weighted_mean(&results))
}

pub(crate) fn weighted_mean(results: &[(f32, usize)]) -> Option<f32> {
    let total: usize = results.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return None;
    }
    let sum: f32 = results.iter().map(|(l, n)| l * *n as f32).sum();
    Some(sum / total as f32)
}

/// Fits `model` on `data` for `epochs` epochs.
///
/// `on_train_end` is dispatched exactly once, whether the loop completes,
/// is stopped by a callback or fails. A loop error is returned unchanged
/// (an `on_train_end` failure is only reported when the loop itself
/// succeeded).
pub fn fit<T: Tensor>(
    epochs: usize,
    model: &mut dyn Model<T>,
    loss_func: &mut dyn LossFunction<T>,
    opt: &SharedOptimizer,
    data: &DataBunch<T>,
    handler: &mut CallbackHandler<'_, T>,
) -> Result<FitOutcome, LearnError> {
    let result = run_epochs(epochs, model, loss_func, opt, data, handler);
    if let Err(e) = &result {
        warn!("Training aborted: {}", e);
    }
    let end = handler.on_train_end(result.as_ref().err());
    let outcome = result?;
    end?;
    Ok(outcome)
}

fn run_epochs<T: Tensor>(
    epochs: usize,
    model: &mut dyn Model<T>,
    loss_func: &mut dyn LossFunction<T>,
    opt: &SharedOptimizer,
    data: &DataBunch<T>,
    handler: &mut CallbackHandler<'_, T>,
) -> Result<FitOutcome, LearnError> {
    handler.on_train_begin(epochs)?;

    for epoch in 0..epochs {
        model.train();
        handler.on_epoch_begin()?;

        for batch in data.train_dl().batches() {
            let batch = handler.on_batch_begin(batch?, true)?;
            let lf: &mut dyn LossFunction<T> = &mut *loss_func;
            let loss = loss_batch(&*model, &batch, Some(lf), Some(opt), handler)?.loss_value()?;
            if handler.on_batch_end(loss)? {
                debug!("Stopping epoch {} after {} batches", epoch, handler.state().num_batch);
                break;
            }
        }

        let val_loss = match data.valid_dl() {
            Some(valid_dl) => {
                let val_loss = validate(model, valid_dl, loss_func, handler, None)?;
                if val_loss.is_none() {
                    warn!("Validation source yielded no samples in epoch {}", epoch);
                }
                val_loss
            }
            None => None,
        };

        if handler.on_epoch_end(val_loss)? {
            return Ok(FitOutcome {
                epochs_completed: epoch + 1,
                termination: Termination::CallbackStop { epoch },
            });
        }
    }

    Ok(FitOutcome {
        epochs_completed: epochs,
        termination: Termination::Completed,
    })
}

#[cfg(test)]
#[path = "basic_train_test.rs"]
mod tests;
