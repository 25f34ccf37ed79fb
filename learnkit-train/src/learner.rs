// learnkit-train/src/learner.rs

//! The [`Learner`] facade.
//!
//! A learner owns everything a fit needs (data, model, loss, optimizer
//! factory, metrics and callbacks), resolves per-layer-group
//! hyper-parameters, re-creates the optimizer and the [`Recorder`] for every
//! fit and manages which layer groups are trainable.

use crate::basic_train::{self, BatchOutput, FitOutcome};
use crate::callbacks::{Callback, OneCycleScheduler};
use crate::config::LearnerConfig;
use crate::handler::CallbackHandler;
use crate::recorder::Recorder;
use learnkit_core::nn::layer::{describe, set_requires_grad};
use learnkit_core::{
    Device, LayerGroup, LayerGroups, LearnError, LossFunction, Metric, Model, OptimWrapper, OptimizerFactory,
    SharedLayer, SharedOptimizer, Tensor,
};
use learnkit_data::{BatchSource, DataBunch};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A learning rate (or weight decay) request, resolved to one value per
/// layer group by [`Learner::lr_range`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lr {
    /// The same value for every group.
    Scalar(f32),
    /// One value per group.
    PerGroup(Vec<f32>),
    /// Geometrically spread from `start` (first group) to `end` (last
    /// group). Without `start`, every group but the last gets `end / 10`.
    Slice { start: Option<f32>, end: f32 },
}

impl Lr {
    pub fn slice(start: f32, end: f32) -> Self {
        Lr::Slice {
            start: Some(start),
            end,
        }
    }

    pub fn up_to(end: f32) -> Self {
        Lr::Slice { start: None, end }
    }
}

impl From<f32> for Lr {
    fn from(value: f32) -> Self {
        Lr::Scalar(value)
    }
}

impl From<Vec<f32>> for Lr {
    fn from(values: Vec<f32>) -> Self {
        Lr::PerGroup(values)
    }
}

/// `n` values spread geometrically from `start` to `stop`.
pub fn even_mults(start: f32, stop: f32, n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![stop],
        _ => {
            let step = (stop / start).powf(1.0 / (n - 1) as f32);
            (0..n).map(|i| start * step.powi(i as i32)).collect()
        }
    }
}

/// What a [`CallbackFn`] gets to build its callback from.
#[derive(Debug, Clone)]
pub struct FitContext {
    /// The optimizer created for this fit.
    pub opt: SharedOptimizer,
    pub n_train_batches: usize,
    pub n_groups: usize,
}

/// Builds a callback for one fit, once the fit's optimizer exists.
pub type CallbackFn<T> = Arc<dyn Fn(&FitContext) -> Result<Box<dyn Callback<T>>, LearnError> + Send + Sync>;

/// Settings of [`Learner::fit_one_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub struct OneCycleOptions {
    pub div_factor: f32,
    pub pct_start: f32,
    pub moms: (f32, f32),
    /// Weight decay; the config's `wd` when unset.
    pub wd: Option<Lr>,
}

impl Default for OneCycleOptions {
    fn default() -> Self {
        Self {
            div_factor: 25.0,
            pct_start: 0.3,
            moms: (0.95, 0.85),
            wd: None,
        }
    }
}

/// One row of [`Learner::layer_group_summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub group: usize,
    pub name: String,
    pub batch_norm: bool,
    pub trainable: bool,
    pub num_parameters: usize,
}

pub struct Learner<T: Tensor> {
    pub data: DataBunch<T>,
    pub model: Box<dyn Model<T>>,
    pub loss_func: Box<dyn LossFunction<T>>,
    pub opt_func: OptimizerFactory,
    pub metrics: Vec<Box<dyn Metric<T>>>,
    /// Callbacks attached to every fit and prediction.
    pub callbacks: Vec<Box<dyn Callback<T>>>,
    /// Callback builders run at the start of every fit.
    pub callback_fns: Vec<CallbackFn<T>>,
    pub config: LearnerConfig,
    layer_groups: LayerGroups,
    opt: Option<SharedOptimizer>,
    recorder: Recorder,
}

impl<T: Tensor> Learner<T> {
    /// Creates a learner with the default config and all of the model's
    /// layers in a single layer group.
    pub fn new(
        data: DataBunch<T>,
        model: Box<dyn Model<T>>,
        loss_func: Box<dyn LossFunction<T>>,
        opt_func: OptimizerFactory,
    ) -> Self {
        let config = LearnerConfig::default();
        let layer_groups = LayerGroups::single(model.layers());
        Self {
            data,
            model,
            loss_func,
            opt_func,
            metrics: Vec::new(),
            callbacks: Vec::new(),
            callback_fns: Vec::new(),
            recorder: Recorder::new(None, config.label_key.clone()),
            config,
            layer_groups,
            opt: None,
        }
    }

    pub fn with_config(mut self, config: LearnerConfig) -> Self {
        self.recorder = Recorder::new(None, config.label_key.clone());
        self.config = config;
        self
    }

    pub fn with_metric(mut self, metric: Box<dyn Metric<T>>) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_callback(mut self, callback: Box<dyn Callback<T>>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_callback_fn(mut self, callback_fn: CallbackFn<T>) -> Self {
        self.callback_fns.push(callback_fn);
        self
    }

    pub fn layer_groups(&self) -> &LayerGroups {
        &self.layer_groups
    }

    /// The optimizer of the most recent fit.
    pub fn opt(&self) -> Option<&SharedOptimizer> {
        self.opt.as_ref()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// Resolves `lr` to one value per layer group.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::HyperParameterMismatch` when a per-group list does
    /// not have one value per layer group.
    pub fn lr_range(&self, lr: &Lr) -> Result<Vec<f32>, LearnError> {
        self.per_group("lr", lr)
    }

    fn per_group(&self, name: &str, value: &Lr) -> Result<Vec<f32>, LearnError> {
        let n = self.layer_groups.len();
        match value {
            Lr::Scalar(v) => Ok(vec![*v; n]),
            Lr::PerGroup(values) if values.len() == n => Ok(values.clone()),
            Lr::PerGroup(values) => Err(LearnError::HyperParameterMismatch {
                name: name.to_string(),
                expected: n,
                actual: values.len(),
            }),
            Lr::Slice { start: Some(start), end } => Ok(even_mults(*start, *end, n)),
            Lr::Slice { start: None, end } => {
                let mut values = vec![end / 10.0; n.saturating_sub(1)];
                values.push(*end);
                Ok(values)
            }
        }
    }

    /// Creates a fresh optimizer over the current layer groups.
    ///
    /// # Arguments
    ///
    /// * `lr`: Learning rate per layer group.
    /// * `wd`: Weight decay per layer group.
    pub fn create_opt(&mut self, lr: &[f32], wd: &[f32]) -> Result<SharedOptimizer, LearnError> {
        let opt = OptimWrapper::create(
            &self.opt_func,
            lr,
            &self.layer_groups,
            wd,
            self.config.true_wd,
            self.config.bn_wd,
        )?
        .into_shared();
        self.opt = Some(opt.clone());
        Ok(opt)
    }

    /// Fits for `epochs` epochs.
    ///
    /// `lr` defaults to the config's `default_lr` and `wd` to its `wd`.
    pub fn fit(
        &mut self,
        epochs: usize,
        lr: Option<Lr>,
        wd: Option<Lr>,
        callbacks: Vec<Box<dyn Callback<T>>>,
    ) -> Result<FitOutcome, LearnError> {
        self.fit_with(epochs, lr, wd, callbacks, Vec::new())
    }

    /// Like [`Learner::fit`] with extra callback builders for this fit only.
    ///
    /// The optimizer and the recorder are re-created first. Callbacks run in
    /// `order()` order; ties keep the order recorder, learner callbacks,
    /// learner callback builders, `callback_fns`, `callbacks`.
    ///
    /// # Errors
    ///
    /// Hyper-parameter errors are returned before anything is dispatched.
    /// Loop errors are returned unchanged after `on_train_end`.
    pub fn fit_with(
        &mut self,
        epochs: usize,
        lr: Option<Lr>,
        wd: Option<Lr>,
        callbacks: Vec<Box<dyn Callback<T>>>,
        callback_fns: Vec<CallbackFn<T>>,
    ) -> Result<FitOutcome, LearnError> {
        let lr = self.lr_range(&lr.unwrap_or(Lr::Scalar(self.config.default_lr)))?;
        let wd = self.per_group("wd", &wd.unwrap_or(Lr::Scalar(self.config.wd)))?;
        let opt = self.create_opt(&lr, &wd)?;
        self.recorder.restart(Some(opt.clone()));

        let ctx = FitContext {
            opt: opt.clone(),
            n_train_batches: self.data.train_dl().len(),
            n_groups: self.layer_groups.len(),
        };
        let mut extra: Vec<Box<dyn Callback<T>>> = Vec::new();
        for build in self.callback_fns.iter().chain(callback_fns.iter()) {
            extra.push(build(&ctx)?);
        }
        extra.extend(callbacks);

        info!(
            "Fitting {} epochs over {} layer groups (lr={:?}, wd={:?})",
            epochs,
            self.layer_groups.len(),
            lr,
            wd
        );

        let mut cbs: Vec<&mut dyn Callback<T>> = Vec::with_capacity(1 + self.callbacks.len() + extra.len());
        cbs.push(&mut self.recorder);
        for cb in self.callbacks.iter_mut() {
            cbs.push(cb.as_mut());
        }
        for cb in extra.iter_mut() {
            cbs.push(cb.as_mut());
        }
        let metrics: Vec<&dyn Metric<T>> = self.metrics.iter().map(|m| m.as_ref() as &dyn Metric<T>).collect();
        let mut handler = CallbackHandler::new(cbs, metrics).with_smooth_beta(self.config.smooth_beta);

        basic_train::fit(
            epochs,
            self.model.as_mut(),
            self.loss_func.as_mut(),
            &opt,
            &self.data,
            &mut handler,
        )
    }

    /// Fits with the one-cycle schedule peaking at `max_lr`.
    pub fn fit_one_cycle(
        &mut self,
        cyc_len: usize,
        max_lr: impl Into<Lr>,
        options: OneCycleOptions,
        callbacks: Vec<Box<dyn Callback<T>>>,
    ) -> Result<FitOutcome, LearnError> {
        let lr_max = self.lr_range(&max_lr.into())?;
        let sched_lrs = lr_max.clone();
        let sched_opts = options.clone();
        let scheduler: CallbackFn<T> = Arc::new(move |ctx: &FitContext| {
            let scheduler = OneCycleScheduler::new(ctx.opt.clone(), sched_lrs.clone(), ctx.n_train_batches)
                .moms(sched_opts.moms)
                .div_factor(sched_opts.div_factor)
                .pct_start(sched_opts.pct_start);
            Ok(Box::new(scheduler) as Box<dyn Callback<T>>)
        });
        self.fit_with(cyc_len, Some(Lr::PerGroup(lr_max)), options.wd, callbacks, vec![scheduler])
    }

    fn is_frozen_layer(&self, layer: &SharedLayer) -> Result<bool, LearnError> {
        let (_, is_bn, _) = describe(layer)?;
        Ok(!(self.config.train_bn && is_bn))
    }

    /// Applies trainability per group: groups in `frozen` are frozen (except
    /// their batch-norm layers when `train_bn`), every other group is
    /// trainable.
    fn apply_frozen(&self, frozen: &[usize]) -> Result<(), LearnError> {
        for (i, group) in self.layer_groups.iter().enumerate() {
            let is_frozen = frozen.contains(&i);
            for layer in group.layers() {
                let trainable = !is_frozen || !self.is_frozen_layer(layer)?;
                set_requires_grad(layer, trainable)?;
            }
        }
        debug!("Frozen layer groups: {:?}", frozen);
        Ok(())
    }

    fn resolve_indices(&self, indices: &[isize]) -> Result<Vec<usize>, LearnError> {
        indices
            .iter()
            .map(|&i| self.layer_groups.resolve_index(i))
            .collect()
    }

    /// Freezes every layer group before `n` and unfreezes the rest. A
    /// negative `n` counts from the end. The optimizer is not re-created.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::LayerGroupIndexOutOfBounds` if `n` is not within
    /// `-len..=len`.
    pub fn freeze_to(&mut self, n: isize) -> Result<(), LearnError> {
        let n = self.layer_groups.resolve_boundary(n)?;
        let frozen: Vec<usize> = (0..n).collect();
        self.apply_frozen(&frozen)
    }

    /// Freezes everything but the last layer group.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::PreconditionViolation` when there is only one
    /// layer group.
    pub fn freeze(&mut self) -> Result<(), LearnError> {
        if self.layer_groups.len() <= 1 {
            return Err(LearnError::PreconditionViolation(
                "freeze() needs more than one layer group".to_string(),
            ));
        }
        self.freeze_to(-1)
    }

    pub fn unfreeze(&mut self) -> Result<(), LearnError> {
        self.freeze_to(0)
    }

    /// Unfreezes every group, then freezes the listed ones. All indices are
    /// checked before any layer changes.
    pub fn freeze_layer_groups(&mut self, indices: &[isize]) -> Result<(), LearnError> {
        let frozen = self.resolve_indices(indices)?;
        self.apply_frozen(&frozen)
    }

    /// Freezes every group not listed.
    pub fn unfreeze_layer_groups(&mut self, indices: &[isize]) -> Result<(), LearnError> {
        let unfrozen = self.resolve_indices(indices)?;
        let frozen = self.layer_groups.complement(&unfrozen);
        self.apply_frozen(&frozen)
    }

    /// Re-partitions the model's layers at `split_points` (see
    /// [`LayerGroups::split_at`]). The next fit creates a matching optimizer.
    pub fn split_layer_groups(&mut self, split_points: &[usize]) -> Result<(), LearnError> {
        self.layer_groups = LayerGroups::split_at(self.model.layers(), split_points)?;
        self.opt = None;
        debug!("Split model into {} layer groups", self.layer_groups.len());
        Ok(())
    }

    /// Replaces the layer groups with an explicit partition of the model.
    pub fn set_layer_groups(&mut self, groups: Vec<LayerGroup>) -> Result<(), LearnError> {
        self.layer_groups = LayerGroups::from_groups(groups, &self.model.layers())?;
        self.opt = None;
        Ok(())
    }

    /// Gradient flags and sizes of every layer, by group.
    pub fn layer_group_summary(&self) -> Result<Vec<LayerSummary>, LearnError> {
        let mut rows = Vec::new();
        for (group, lg) in self.layer_groups.iter().enumerate() {
            for layer in lg.layers() {
                let guard = layer
                    .read()
                    .map_err(|e| LearnError::lock("read", format!("layer lock poisoned: {}", e)))?;
                rows.push(LayerSummary {
                    group,
                    name: guard.name().to_string(),
                    batch_norm: guard.is_batch_norm(),
                    trainable: guard.requires_grad(),
                    num_parameters: guard.num_parameters(),
                });
            }
        }
        Ok(rows)
    }

    /// Runs the model over `dl` in eval mode without gradients and returns
    /// the detached output of every batch, in order.
    ///
    /// Only `on_batch_begin` and `on_loss_begin` are dispatched, to the
    /// learner's callbacks and then `callbacks`.
    pub fn predict_on_dl(
        &mut self,
        dl: &dyn BatchSource<T>,
        mut callbacks: Vec<Box<dyn Callback<T>>>,
    ) -> Result<Vec<T>, LearnError> {
        predict_outputs(self.model.as_mut(), dl, &mut self.callbacks, &mut callbacks)
    }

    /// [`Learner::predict_on_dl`] over the data bunch's test source.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::PreconditionViolation` when there is no test
    /// source.
    pub fn predict_on_test_dl(&mut self, mut callbacks: Vec<Box<dyn Callback<T>>>) -> Result<Vec<T>, LearnError> {
        let Some(test_dl) = self.data.test_dl() else {
            return Err(LearnError::PreconditionViolation(
                "the data bunch has no test source".to_string(),
            ));
        };
        predict_outputs(self.model.as_mut(), test_dl, &mut self.callbacks, &mut callbacks)
    }

    /// Loads model parameters from `path` onto `device`, or the data
    /// bunch's device.
    pub fn load_from_path(&mut self, path: impl AsRef<Path>, device: Option<Device>) -> Result<(), LearnError> {
        let device = device.unwrap_or(self.data.device);
        info!("Loading model state from {} onto {}", path.as_ref().display(), device);
        self.model.load_state(path.as_ref(), device)
    }

    /// Path of the checkpoint `name` inside the config's model directory.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.config.model_dir.join(format!("{}.pth", name))
    }

    /// Loads the checkpoint `name` from the model directory.
    pub fn load(&mut self, name: &str, device: Option<Device>) -> Result<(), LearnError> {
        let path = self.model_path(name);
        self.load_from_path(path, device)
    }
}

fn predict_outputs<T: Tensor>(
    model: &mut dyn Model<T>,
    dl: &dyn BatchSource<T>,
    learner_callbacks: &mut [Box<dyn Callback<T>>],
    callbacks: &mut [Box<dyn Callback<T>>],
) -> Result<Vec<T>, LearnError> {
    let mut cbs: Vec<&mut dyn Callback<T>> = Vec::with_capacity(learner_callbacks.len() + callbacks.len());
    for cb in learner_callbacks.iter_mut() {
        cbs.push(cb.as_mut());
    }
    for cb in callbacks.iter_mut() {
        cbs.push(cb.as_mut());
    }
    let mut handler = CallbackHandler::new(cbs, Vec::new());

    model.eval();
    model.set_grad_enabled(false);
    let result = collect_outputs(&*model, dl, &mut handler);
    model.set_grad_enabled(true);
    result
}

fn collect_outputs<T: Tensor>(
    model: &dyn Model<T>,
    dl: &dyn BatchSource<T>,
    handler: &mut CallbackHandler<'_, T>,
) -> Result<Vec<T>, LearnError> {
    let mut outputs = Vec::with_capacity(dl.len());
    for batch in dl.batches() {
        let batch = handler.on_batch_begin(batch?, false)?;
        match basic_train::loss_batch(model, &batch, None, None, handler)? {
            BatchOutput::Prediction { output, .. } => outputs.push(output),
            BatchOutput::Loss(_) => {
                return Err(LearnError::InternalError(
                    "prediction produced a loss".to_string(),
                ))
            }
        }
    }
    Ok(outputs)
}

impl<T: Tensor> std::fmt::Debug for Learner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Learner")
            .field("data", &self.data)
            .field("model", &self.model)
            .field("loss_func", &self.loss_func)
            .field("metrics", &self.metrics)
            .field("callbacks", &self.callbacks.iter().map(|cb| cb.name()).collect::<Vec<_>>())
            .field("callback_fns", &self.callback_fns.len())
            .field("config", &self.config)
            .field("layer_groups", &self.layer_groups.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "learner_test.rs"]
mod tests;
