// learnkit-train/src/schemes.rs

//! Ready-made training schedules built on [`Learner`].

use crate::basic_train::FitOutcome;
use crate::learner::{Learner, Lr, OneCycleOptions};
use learnkit_core::{LearnError, Tensor};
use log::info;

/// Learning rate of the first warm-up iteration in [`lr_warmup`].
pub const WARMUP_START_LR: f32 = 1e-9;

/// Per-group learning rates for `n` groups, ending at `lr`: the last group
/// gets `lr`, the one before `lr / 3` and every earlier group `lr / 10`.
pub fn discriminative_lrs(lr: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| match n - 1 - i {
            0 => lr,
            1 => lr / 3.0,
            _ => lr / 10.0,
        })
        .collect()
}

/// Splits the model into stem (`n_start` layers), body (`n_middle` layers)
/// and head (the rest).
pub fn three_tier_layer_groups<T: Tensor>(
    learner: &mut Learner<T>,
    n_start: usize,
    n_middle: usize,
) -> Result<(), LearnError> {
    learner.split_layer_groups(&[n_start, n_start + n_middle])
}

/// Unfreezes the whole model and runs one cycle of `epochs` epochs.
pub fn one_cycle<T: Tensor>(
    learner: &mut Learner<T>,
    lr: impl Into<Lr>,
    epochs: usize,
    div_factor: f32,
) -> Result<FitOutcome, LearnError> {
    learner.unfreeze()?;
    let options = OneCycleOptions {
        div_factor,
        ..OneCycleOptions::default()
    };
    learner.fit_one_cycle(epochs, lr, options, Vec::new())
}

/// Like [`one_cycle`] with [`discriminative_lrs`] peaking at `lr / lr_divisor`.
pub fn discriminative_one_cycle<T: Tensor>(
    learner: &mut Learner<T>,
    lr: f32,
    epochs: usize,
    lr_divisor: f32,
) -> Result<FitOutcome, LearnError> {
    let lrs = discriminative_lrs(lr / lr_divisor, learner.layer_groups().len());
    one_cycle(learner, lrs, epochs, 25.0)
}

/// One cycle whose warm-up starts from [`WARMUP_START_LR`] and lasts
/// `warmup_epochs` epochs (by default 5% of `epochs`, plus one).
///
/// # Errors
///
/// Returns `LearnError::PreconditionViolation` unless the warm-up is shorter
/// than the whole run.
pub fn lr_warmup<T: Tensor>(
    learner: &mut Learner<T>,
    epochs: usize,
    warmup_epochs: Option<usize>,
    lr: f32,
) -> Result<FitOutcome, LearnError> {
    let warmup = warmup_epochs.unwrap_or((epochs as f32 * 0.05) as usize + 1);
    if warmup >= epochs {
        return Err(LearnError::PreconditionViolation(format!(
            "warm-up of {} epochs must be shorter than the run of {} epochs",
            warmup, epochs
        )));
    }
    learner.unfreeze()?;
    let options = OneCycleOptions {
        div_factor: lr / WARMUP_START_LR,
        pct_start: warmup as f32 / epochs as f32,
        ..OneCycleOptions::default()
    };
    info!("Warming up for {} of {} epochs", warmup, epochs);
    learner.fit_one_cycle(epochs, lr, options, Vec::new())
}

/// Epoch counts and learning-rate divisors of the cycles run by
/// [`gradual_unfreeze`] once the whole model is trainable.
const UNFROZEN_CYCLES: [(usize, f32); 7] = [(2, 4.0), (2, 4.0), (2, 4.0), (2, 4.0), (4, 4.0), (4, 4.0), (8, 16.0)];

/// Trains the head alone for one epoch (every other group at learning rate
/// 0), then unfreezes everything and runs a sequence of one-cycle fits with
/// discriminative learning rates.
///
/// Returns the outcome of every fit, in order.
pub fn gradual_unfreeze<T: Tensor>(learner: &mut Learner<T>, lr: f32) -> Result<Vec<FitOutcome>, LearnError> {
    let n = learner.layer_groups().len();
    let lrs = discriminative_lrs(lr, n);
    let mut head_only = vec![0.0; n.saturating_sub(1)];
    head_only.push(lr);

    learner.unfreeze_layer_groups(&[-1])?;
    let mut outcomes = vec![learner.fit(1, Some(Lr::PerGroup(head_only)), None, Vec::new())?];

    learner.unfreeze()?;
    for (epochs, divisor) in UNFROZEN_CYCLES {
        let max_lr: Vec<f32> = lrs.iter().map(|lr| lr / divisor).collect();
        outcomes.push(learner.fit_one_cycle(epochs, max_lr, OneCycleOptions::default(), Vec::new())?);
    }
    Ok(outcomes)
}

#[cfg(test)]
#[path = "schemes_test.rs"]
mod tests;
