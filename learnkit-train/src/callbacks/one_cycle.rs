// learnkit-train/src/callbacks/one_cycle.rs

//! One-cycle learning-rate and momentum schedule.
//!
//! The learning rate warms up from `lr_max / div_factor` to `lr_max` over
//! the first `pct_start` of the iterations, then anneals down to
//! `lr_max / (div_factor * 1e4)`. Momentum moves the opposite way. Both
//! phases use cosine annealing.

use super::{Callback, CallbackState};
use learnkit_core::optim::{read_optimizer, write_optimizer};
use learnkit_core::{LearnError, SharedOptimizer, Tensor};
use log::debug;
use std::f32::consts::PI;

/// Cosine interpolation from `start` (at `pct = 0`) to `end` (at `pct = 1`).
pub fn annealing_cos(start: f32, end: f32, pct: f32) -> f32 {
    end + (start - end) / 2.0 * ((PI * pct).cos() + 1.0)
}

/// Steps one value per layer group from `start` to `end` in `n_iter` steps.
#[derive(Debug, Clone)]
struct Stepper {
    start: Vec<f32>,
    end: Vec<f32>,
    n: usize,
    n_iter: usize,
}

impl Stepper {
    fn new(start: Vec<f32>, end: Vec<f32>, n_iter: usize) -> Self {
        Self {
            start,
            end,
            n: 0,
            n_iter: n_iter.max(1),
        }
    }

    fn step(&mut self) -> Vec<f32> {
        self.n += 1;
        let pct = self.n as f32 / self.n_iter as f32;
        self.start
            .iter()
            .zip(&self.end)
            .map(|(&s, &e)| annealing_cos(s, e, pct))
            .collect()
    }

    fn is_done(&self) -> bool {
        self.n >= self.n_iter
    }
}

#[derive(Debug)]
pub struct OneCycleScheduler {
    opt: SharedOptimizer,
    lr_max: Vec<f32>,
    n_train_batches: usize,
    moms: (f32, f32),
    div_factor: f32,
    pct_start: f32,
    lr_scheds: Vec<Stepper>,
    mom_scheds: Vec<Stepper>,
    idx_s: usize,
}

impl OneCycleScheduler {
    /// Creates a scheduler writing into `opt`.
    ///
    /// # Arguments
    ///
    /// * `opt`: The optimizer of the fit being scheduled.
    /// * `lr_max`: Peak learning rate, one value per layer group.
    /// * `n_train_batches`: Batches per training epoch.
    pub fn new(opt: SharedOptimizer, lr_max: Vec<f32>, n_train_batches: usize) -> Self {
        Self {
            opt,
            lr_max,
            n_train_batches,
            moms: (0.95, 0.85),
            div_factor: 25.0,
            pct_start: 0.3,
            lr_scheds: Vec::new(),
            mom_scheds: Vec::new(),
            idx_s: 0,
        }
    }

    pub fn moms(mut self, moms: (f32, f32)) -> Self {
        self.moms = moms;
        self
    }

    pub fn div_factor(mut self, div_factor: f32) -> Self {
        self.div_factor = div_factor;
        self
    }

    pub fn pct_start(mut self, pct_start: f32) -> Self {
        self.pct_start = pct_start;
        self
    }

    /// Index of the running phase (0 warm-up, 1 annealing, 2 done).
    pub fn phase(&self) -> usize {
        self.idx_s
    }

    fn apply(&self, lr: &[f32], mom: &[f32]) -> Result<(), LearnError> {
        let mut opt = write_optimizer(&self.opt)?;
        opt.set_lr(lr)?;
        opt.set_mom(mom)
    }
}

impl<T: Tensor> Callback<T> for OneCycleScheduler {
    fn name(&self) -> &str {
        "OneCycleScheduler"
    }

    fn on_train_begin(&mut self, state: &CallbackState) -> Result<(), LearnError> {
        let n_groups = read_optimizer(&self.opt)?.n_groups();
        if self.lr_max.len() != n_groups {
            return Err(LearnError::HyperParameterMismatch {
                name: "lr_max".to_string(),
                expected: n_groups,
                actual: self.lr_max.len(),
            });
        }
        if !(0.0..=1.0).contains(&self.pct_start) {
            return Err(LearnError::PreconditionViolation(format!(
                "pct_start must be within [0, 1], got {}",
                self.pct_start
            )));
        }
        let n = self.n_train_batches * state.n_epochs;
        let a1 = (n as f32 * self.pct_start) as usize;
        let a2 = n - a1;

        let low_lr: Vec<f32> = self.lr_max.iter().map(|lr| lr / self.div_factor).collect();
        let final_lr: Vec<f32> = self
            .lr_max
            .iter()
            .map(|lr| lr / (self.div_factor * 1e4))
            .collect();
        let (mom_hi, mom_lo) = (vec![self.moms.0; n_groups], vec![self.moms.1; n_groups]);

        self.lr_scheds = vec![
            Stepper::new(low_lr.clone(), self.lr_max.clone(), a1),
            Stepper::new(self.lr_max.clone(), final_lr, a2),
        ];
        self.mom_scheds = vec![
            Stepper::new(mom_hi.clone(), mom_lo.clone(), a1),
            Stepper::new(mom_lo, mom_hi.clone(), a2),
        ];
        self.idx_s = 0;
        debug!(
            "One-cycle over {} iterations ({} warm-up), lr {:?} -> {:?}",
            n, a1, low_lr, self.lr_max
        );
        self.apply(&low_lr, &mom_hi)
    }

    /// Writes the next scheduled values; votes to stop once both phases are
    /// complete.
    fn on_batch_end(&mut self, state: &CallbackState) -> Result<bool, LearnError> {
        if !state.train {
            return Ok(false);
        }
        if self.idx_s >= self.lr_scheds.len() {
            return Ok(true);
        }
        let lr = self.lr_scheds[self.idx_s].step();
        let mom = self.mom_scheds[self.idx_s].step();
        self.apply(&lr, &mom)?;
        if self.lr_scheds[self.idx_s].is_done() {
            self.idx_s += 1;
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "one_cycle_test.rs"]
mod tests;
