// learnkit-core/src/optim/wrapper.rs

//! Hyper-parameter layer on top of an engine optimizer.
//!
//! [`OptimWrapper`] keeps one learning rate, momentum and weight decay per
//! layer group and writes them into the engine optimizer's parameter
//! groups. Each layer group maps to two parameter groups (regular layers
//! first, batch-norm layers second) so that weight decay on batch-norm
//! layers can be switched off independently.

use super::optimizer_trait::Optimizer;
use super::param_group::{ParamGroup, ParamGroupOptions};
use crate::error::LearnError;
use crate::nn::layer_group::LayerGroups;
use log::debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Builds an engine optimizer over the given parameter groups.
///
/// The groups arrive with their learning rate set; the factory is expected
/// to fill in its own defaults (momentum or betas, eps, ...).
pub type OptimizerFactory =
    Arc<dyn Fn(Vec<ParamGroup>) -> Result<Box<dyn Optimizer>, LearnError> + Send + Sync>;

/// The optimizer is shared between the training loop and the callbacks that
/// read or schedule its hyper-parameters.
pub type SharedOptimizer = Arc<RwLock<OptimWrapper>>;

/// Acquires a read guard on a shared optimizer.
pub fn read_optimizer(opt: &SharedOptimizer) -> Result<RwLockReadGuard<'_, OptimWrapper>, LearnError> {
    opt.read()
        .map_err(|e| LearnError::lock("read", format!("optimizer lock poisoned: {}", e)))
}

/// Acquires a write guard on a shared optimizer.
pub fn write_optimizer(
    opt: &SharedOptimizer,
) -> Result<RwLockWriteGuard<'_, OptimWrapper>, LearnError> {
    opt.write()
        .map_err(|e| LearnError::lock("write", format!("optimizer lock poisoned: {}", e)))
}

#[derive(Debug)]
pub struct OptimWrapper {
    opt: Box<dyn Optimizer>,
    lr: Vec<f32>,
    mom: Vec<f32>,
    beta: Option<Vec<f32>>,
    wd: Vec<f32>,
    true_wd: bool,
    bn_wd: bool,
}

fn check_len(name: &str, values: &[f32], expected: usize) -> Result<(), LearnError> {
    if values.len() != expected {
        return Err(LearnError::HyperParameterMismatch {
            name: name.to_string(),
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

impl OptimWrapper {
    /// Creates the engine optimizer for `layer_groups` and applies `lr` and
    /// `wd` (one value per layer group).
    ///
    /// # Arguments
    ///
    /// * `factory`: Builds the engine optimizer.
    /// * `lr`: Learning rate per layer group.
    /// * `layer_groups`: The model partition to optimize.
    /// * `wd`: Weight decay per layer group.
    /// * `true_wd`: Apply weight decay by scaling parameters before each step
    ///   instead of through the optimizer's L2 term.
    /// * `bn_wd`: Also apply weight decay to batch-norm layers.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::HyperParameterMismatch` if `lr` or `wd` do not
    /// have one value per layer group, and propagates factory errors.
    pub fn create(
        factory: &OptimizerFactory,
        lr: &[f32],
        layer_groups: &LayerGroups,
        wd: &[f32],
        true_wd: bool,
        bn_wd: bool,
    ) -> Result<Self, LearnError> {
        let n = layer_groups.len();
        check_len("lr", lr, n)?;
        check_len("wd", wd, n)?;

        let mut groups = Vec::with_capacity(2 * n);
        for (group, &group_lr) in layer_groups.iter().zip(lr) {
            let (regular, batch_norm) = group.split_batch_norm()?;
            for (layers, is_bn) in [(regular, false), (batch_norm, true)] {
                let mut pg = ParamGroup::new(layers, is_bn);
                pg.set_lr(group_lr);
                groups.push(pg);
            }
        }

        let opt = factory(groups)?;
        if opt.param_groups().len() != 2 * n {
            return Err(LearnError::InternalError(format!(
                "optimizer factory returned {} parameter groups, expected {}",
                opt.param_groups().len(),
                2 * n
            )));
        }

        let mut wrapper = Self::from_defaults(opt, n, true_wd, bn_wd);
        wrapper.set_lr(lr)?;
        wrapper.set_wd(wd)?;
        debug!(
            "Created optimizer over {} layer groups (lr={:?}, wd={:?}, true_wd={}, bn_wd={})",
            n, wrapper.lr, wrapper.wd, true_wd, bn_wd
        );
        Ok(wrapper)
    }

    fn from_defaults(opt: Box<dyn Optimizer>, n: usize, true_wd: bool, bn_wd: bool) -> Self {
        let first: ParamGroupOptions = opt
            .param_groups()
            .first()
            .map(|pg| pg.options.clone())
            .unwrap_or_default();
        let (mom, beta) = match (first.betas, first.momentum) {
            (Some((b1, b2)), _) => (vec![b1; n], Some(vec![b2; n])),
            (None, Some(m)) => (vec![m; n], None),
            (None, None) => (vec![0.0; n], None),
        };
        let wd = vec![first.weight_decay.unwrap_or(0.0); n];
        Self {
            opt,
            lr: vec![0.0; n],
            mom,
            beta,
            wd,
            true_wd,
            bn_wd,
        }
    }

    /// Writes one value per layer group into both of its parameter groups
    /// (only the regular half when `bn_groups` is false).
    fn set_val(&mut self, values: &[f32], bn_groups: bool, apply: impl Fn(&mut ParamGroupOptions, f32)) {
        for (i, pair) in self.opt.param_groups_mut().chunks_mut(2).enumerate() {
            let Some(&v) = values.get(i) else { break };
            apply(&mut pair[0].options, v);
            if bn_groups {
                if let Some(bn) = pair.get_mut(1) {
                    apply(&mut bn.options, v);
                }
            }
        }
    }

    /// Number of layer groups handled by the wrapper.
    pub fn n_groups(&self) -> usize {
        self.lr.len()
    }

    /// Learning rate of the last layer group.
    pub fn lr(&self) -> f32 {
        self.lr.last().copied().unwrap_or(0.0)
    }

    pub fn lrs(&self) -> &[f32] {
        &self.lr
    }

    pub fn set_lr(&mut self, lr: &[f32]) -> Result<(), LearnError> {
        check_len("lr", lr, self.n_groups())?;
        self.lr = lr.to_vec();
        self.set_val(lr, true, |o, v| o.lr = Some(v));
        Ok(())
    }

    /// Momentum of the last layer group (first beta for Adam-like optimizers).
    pub fn mom(&self) -> f32 {
        self.mom.last().copied().unwrap_or(0.0)
    }

    pub fn moms(&self) -> &[f32] {
        &self.mom
    }

    pub fn set_mom(&mut self, mom: &[f32]) -> Result<(), LearnError> {
        check_len("mom", mom, self.n_groups())?;
        self.mom = mom.to_vec();
        let uses_momentum = self
            .opt
            .param_groups()
            .first()
            .map(|pg| pg.options.betas.is_some() || pg.options.momentum.is_some())
            .unwrap_or(false);
        if uses_momentum {
            for (i, pair) in self.opt.param_groups_mut().chunks_mut(2).enumerate() {
                let Some(&v) = mom.get(i) else { break };
                for pg in pair.iter_mut() {
                    pg.set_momentum(v);
                }
            }
        }
        Ok(())
    }

    /// Second beta, for Adam-like optimizers.
    pub fn beta(&self) -> Option<f32> {
        self.beta.as_ref().and_then(|b| b.last().copied())
    }

    pub fn set_beta(&mut self, beta: &[f32]) -> Result<(), LearnError> {
        check_len("beta", beta, self.n_groups())?;
        if self.beta.is_none() {
            return Ok(());
        }
        self.beta = Some(beta.to_vec());
        self.set_val(beta, true, |o, v| {
            if let Some((b1, _)) = o.betas {
                o.betas = Some((b1, v));
            }
        });
        Ok(())
    }

    /// Weight decay of the last layer group.
    pub fn wd(&self) -> f32 {
        self.wd.last().copied().unwrap_or(0.0)
    }

    pub fn wds(&self) -> &[f32] {
        &self.wd
    }

    /// Sets weight decay. With `true_wd` the optimizer's own L2 term is
    /// zeroed and decay is applied in [`OptimWrapper::step`] instead.
    pub fn set_wd(&mut self, wd: &[f32]) -> Result<(), LearnError> {
        check_len("wd", wd, self.n_groups())?;
        self.wd = wd.to_vec();
        let engine_wd: Vec<f32> = if self.true_wd {
            vec![0.0; wd.len()]
        } else {
            wd.to_vec()
        };
        self.set_val(&engine_wd, true, |o, v| o.weight_decay = Some(v));
        if !self.bn_wd {
            for pair in self.opt.param_groups_mut().chunks_mut(2) {
                if let Some(bn) = pair.get_mut(1) {
                    bn.options.weight_decay = Some(0.0);
                }
            }
        }
        Ok(())
    }

    pub fn true_wd(&self) -> bool {
        self.true_wd
    }

    pub fn bn_wd(&self) -> bool {
        self.bn_wd
    }

    /// Applies decoupled weight decay (if enabled) and steps the optimizer.
    pub fn step(&mut self) -> Result<(), LearnError> {
        if self.true_wd {
            for i in 0..self.n_groups() {
                let factor = self.lr[i] * self.wd[i];
                if factor == 0.0 {
                    continue;
                }
                self.opt.decay_weights(2 * i, factor)?;
                if self.bn_wd {
                    self.opt.decay_weights(2 * i + 1, factor)?;
                }
            }
        }
        self.opt.step()
    }

    pub fn zero_grad(&mut self) {
        self.opt.zero_grad();
    }

    /// The wrapped engine optimizer.
    pub fn optimizer(&self) -> &dyn Optimizer {
        self.opt.as_ref()
    }

    pub fn into_shared(self) -> SharedOptimizer {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
#[path = "wrapper_test.rs"]
mod tests;
