//! A small deterministic stand-in for a tensor engine.
//!
//! Used by the workspace's tests (and handy for downstream callback tests):
//! tensors are flat `f32` vectors, the model is a per-element scaling, the
//! loss is an L1 distance with optional named components, and the optimizer
//! only records what it was asked to do.

use crate::batch::{Batch, Targets};
use crate::device::Device;
use crate::error::LearnError;
use crate::metric::Metric;
use crate::nn::layer::{shared, Layer, SharedLayer};
use crate::nn::loss::{LossComponent, LossFunction};
use crate::nn::model::Model;
use crate::optim::optimizer_trait::Optimizer;
use crate::optim::param_group::ParamGroup;
use crate::optim::wrapper::OptimizerFactory;
use crate::tensor::Tensor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared, append-only list of event names, used to assert call ordering.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event.into());
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.0.lock() {
            events.clear();
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockTensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    requires_grad: bool,
    log: Option<EventLog>,
}

impl MockTensor {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self {
            data,
            shape,
            requires_grad: false,
            log: None,
        }
    }

    /// A 1-D tensor of `len` samples, all equal to `value`.
    pub fn filled(value: f32, len: usize) -> Self {
        Self::new(vec![value; len], vec![len])
    }

    pub fn scalar(value: f32) -> Self {
        Self::new(vec![value], vec![])
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn requiring_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }
}

impl Tensor for MockTensor {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn detach(&self) -> Self {
        Self {
            data: self.data.clone(),
            shape: self.shape.clone(),
            requires_grad: false,
            log: None,
        }
    }

    fn item(&self) -> Result<f32, LearnError> {
        match self.data.as_slice() {
            [v] => Ok(*v),
            other => Err(LearnError::Engine(format!(
                "item() called on a tensor with {} elements",
                other.len()
            ))),
        }
    }

    fn to_vec(&self) -> Result<Vec<f32>, LearnError> {
        Ok(self.data.clone())
    }

    fn backward(&self) -> Result<(), LearnError> {
        if !self.requires_grad {
            return Err(LearnError::Engine(
                "backward() called on a tensor that does not require grad".to_string(),
            ));
        }
        if let Some(log) = &self.log {
            log.push("backward");
        }
        Ok(())
    }
}

/// Builds a batch of `size` samples whose inputs are all `input` and whose
/// targets are zeros stored under `"label"`. With the identity
/// [`MockModel`] and [`MockLoss`] the batch loss is exactly `input`.
pub fn labeled_batch(input: f32, size: usize) -> Batch<MockTensor> {
    Batch::new(
        vec![MockTensor::filled(input, size)],
        Targets::new().with("label", MockTensor::filled(0.0, size)),
    )
}

/// Like [`labeled_batch`] without any target.
pub fn unlabeled_batch(input: f32, size: usize) -> Batch<MockTensor> {
    Batch::unlabeled(vec![MockTensor::filled(input, size)])
}

#[derive(Debug, Clone)]
pub struct MockLayer {
    name: String,
    batch_norm: bool,
    requires_grad: bool,
}

impl MockLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batch_norm: false,
            requires_grad: true,
        }
    }

    pub fn batch_norm(name: impl Into<String>) -> Self {
        Self {
            batch_norm: true,
            ..Self::new(name)
        }
    }

    pub fn into_shared(self) -> SharedLayer {
        shared(self)
    }
}

impl Layer for MockLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_batch_norm(&self) -> bool {
        self.batch_norm
    }

    fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    fn num_parameters(&self) -> usize {
        if self.batch_norm {
            2
        } else {
            1
        }
    }
}

/// Multiplies its first input by `scale`. The output tracks gradients while
/// gradient recording is enabled.
#[derive(Debug)]
pub struct MockModel {
    layers: Vec<SharedLayer>,
    scale: f32,
    training: bool,
    grad_enabled: bool,
    fail_after: Option<usize>,
    calls: AtomicUsize,
    log: Option<EventLog>,
    loaded: Option<(PathBuf, Device)>,
}

impl MockModel {
    pub fn new(layers: Vec<SharedLayer>) -> Self {
        Self {
            layers,
            scale: 1.0,
            training: true,
            grad_enabled: true,
            fail_after: None,
            calls: AtomicUsize::new(0),
            log: None,
            loaded: None,
        }
    }

    /// A model with `n` plain layers named `layer0..`.
    pub fn with_layers(n: usize) -> Self {
        Self::new(
            (0..n)
                .map(|i| MockLayer::new(format!("layer{}", i)).into_shared())
                .collect(),
        )
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Makes every forward pass after the first `calls` fail.
    pub fn fail_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn forward_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    pub fn loaded_from(&self) -> Option<&(PathBuf, Device)> {
        self.loaded.as_ref()
    }
}

impl Model<MockTensor> for MockModel {
    fn forward(&self, inputs: &[MockTensor]) -> Result<MockTensor, LearnError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.fail_after {
            if call > limit {
                return Err(LearnError::Engine(format!("forward failed on call {}", call)));
            }
        }
        let input = inputs
            .first()
            .ok_or_else(|| LearnError::Engine("forward() called without inputs".to_string()))?;
        if let Some(log) = &self.log {
            log.push("forward");
        }
        let mut out = MockTensor::new(
            input.data.iter().map(|v| v * self.scale).collect(),
            input.shape.clone(),
        )
        .requiring_grad(self.grad_enabled);
        out.log = self.log.clone();
        Ok(out)
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    fn layers(&self) -> Vec<SharedLayer> {
        self.layers.clone()
    }

    fn load_state(&mut self, path: &Path, device: Device) -> Result<(), LearnError> {
        if !path.exists() {
            return Err(LearnError::Io {
                path: path.display().to_string(),
                reason: "no such file".to_string(),
            });
        }
        self.loaded = Some((path.to_path_buf(), device));
        Ok(())
    }
}

/// Per-sample L1 distance between the output and the first target, summed
/// over weighted named components. With no explicit component a single
/// `"L1Loss"` term of weight 1 is used.
#[derive(Debug, Clone)]
pub struct MockLoss {
    components: Vec<(String, f32)>,
    batch_means: bool,
    last: Vec<LossComponent>,
}

impl Default for MockLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLoss {
    pub fn new() -> Self {
        Self {
            components: vec![("L1Loss".to_string(), 1.0)],
            batch_means: false,
            last: Vec::new(),
        }
    }

    pub fn with_components(components: &[(&str, f32)]) -> Self {
        Self {
            components: components
                .iter()
                .map(|(n, w)| (n.to_string(), *w))
                .collect(),
            batch_means: false,
            last: Vec::new(),
        }
    }

    /// Reports each component as a single batch-mean value instead of one
    /// value per sample.
    pub fn batch_means(mut self) -> Self {
        self.batch_means = true;
        self
    }
}

impl LossFunction<MockTensor> for MockLoss {
    fn compute(
        &mut self,
        output: &MockTensor,
        targets: &Targets<MockTensor>,
    ) -> Result<MockTensor, LearnError> {
        let target = targets.first().ok_or_else(|| LearnError::MissingField {
            field: "target".to_string(),
        })?;
        if target.data.len() != output.data.len() {
            return Err(LearnError::Engine(format!(
                "output has {} elements, target has {}",
                output.data.len(),
                target.data.len()
            )));
        }
        let diffs: Vec<f32> = output
            .data
            .iter()
            .zip(&target.data)
            .map(|(o, t)| (o - t).abs())
            .collect();
        let mean = if diffs.is_empty() {
            0.0
        } else {
            diffs.iter().sum::<f32>() / diffs.len() as f32
        };
        self.last = self
            .components
            .iter()
            .map(|(name, w)| {
                let values = if self.batch_means {
                    vec![w * mean]
                } else {
                    diffs.iter().map(|d| d * w).collect()
                };
                LossComponent::new(name.clone(), values)
            })
            .collect();
        let total: f32 = self.components.iter().map(|(_, w)| w * mean).sum();
        let mut loss = MockTensor::scalar(total).requiring_grad(output.requires_grad);
        loss.log = output.log.clone();
        Ok(loss)
    }

    fn components(&self) -> Vec<LossComponent> {
        self.last.clone()
    }
}

/// Mean absolute error between output and first target.
#[derive(Debug, Clone, Default)]
pub struct MeanAbsoluteError;

impl Metric<MockTensor> for MeanAbsoluteError {
    fn name(&self) -> &str {
        "mae"
    }

    fn compute(&self, output: &MockTensor, targets: &Targets<MockTensor>) -> Result<f32, LearnError> {
        let target = targets.first().ok_or_else(|| LearnError::MissingField {
            field: "target".to_string(),
        })?;
        let n = output.data.len().max(1) as f32;
        Ok(output
            .data
            .iter()
            .zip(&target.data)
            .map(|(o, t)| (o - t).abs())
            .sum::<f32>()
            / n)
    }
}

/// Which hyper-parameter family the mock optimizer reports as its defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockDefaults {
    Momentum(f32),
    Betas(f32, f32),
    Plain,
}

/// Records `step`, `zero_grad` and weight-decay calls instead of updating
/// anything.
#[derive(Debug)]
pub struct MockOptimizer {
    param_groups: Vec<ParamGroup>,
    log: Option<EventLog>,
    pub steps: usize,
    pub zero_grads: usize,
    pub decays: Vec<(usize, f32)>,
}

impl MockOptimizer {
    pub fn new(mut param_groups: Vec<ParamGroup>, defaults: MockDefaults, log: Option<EventLog>) -> Self {
        for pg in param_groups.iter_mut() {
            match defaults {
                MockDefaults::Momentum(m) => pg.options.momentum = Some(m),
                MockDefaults::Betas(b1, b2) => pg.options.betas = Some((b1, b2)),
                MockDefaults::Plain => {}
            }
            pg.options.weight_decay.get_or_insert(0.0);
        }
        Self {
            param_groups,
            log,
            steps: 0,
            zero_grads: 0,
            decays: Vec::new(),
        }
    }

    /// An SGD-like factory (momentum 0.9).
    pub fn factory(log: Option<EventLog>) -> OptimizerFactory {
        Self::factory_with(MockDefaults::Momentum(0.9), log)
    }

    pub fn factory_with(defaults: MockDefaults, log: Option<EventLog>) -> OptimizerFactory {
        Arc::new(move |groups| {
            Ok(Box::new(MockOptimizer::new(groups, defaults, log.clone())) as Box<dyn Optimizer>)
        })
    }
}

impl Optimizer for MockOptimizer {
    fn step(&mut self) -> Result<(), LearnError> {
        self.steps += 1;
        if let Some(log) = &self.log {
            log.push("step");
        }
        Ok(())
    }

    fn zero_grad(&mut self) {
        self.zero_grads += 1;
        if let Some(log) = &self.log {
            log.push("zero_grad");
        }
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.param_groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.param_groups
    }

    fn decay_weights(&mut self, group: usize, factor: f32) -> Result<(), LearnError> {
        if group >= self.param_groups.len() {
            return Err(LearnError::InternalError(format!(
                "parameter group {} does not exist",
                group
            )));
        }
        self.decays.push((group, factor));
        if let Some(log) = &self.log {
            log.push(format!("decay:{}", group));
        }
        Ok(())
    }
}
