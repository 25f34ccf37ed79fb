use crate::nn::layer::SharedLayer;

/// Defines a group of layers whose parameters are optimized with the same
/// hyper-parameters.
///
/// [`OptimWrapper`](crate::optim::OptimWrapper) creates two groups per layer
/// group: one for regular layers and one for batch-norm layers, so that
/// weight decay can be applied to them differently.
#[derive(Clone, Debug)]
pub struct ParamGroup {
    /// The layers whose trainable parameters belong to this group.
    pub layers: Vec<SharedLayer>,

    /// `true` for the batch-norm half of a layer group.
    pub batch_norm: bool,

    /// Specific options/hyperparameters for this group.
    pub options: ParamGroupOptions,
}

/// Options specific to a parameter group.
///
/// `None` means the optimizer does not use (or has not been given) the value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamGroupOptions {
    pub lr: Option<f32>,
    pub betas: Option<(f32, f32)>,
    pub eps: Option<f32>,
    pub weight_decay: Option<f32>,
    pub momentum: Option<f32>,
}

impl ParamGroup {
    /// Creates a new parameter group with default options.
    pub fn new(layers: Vec<SharedLayer>, batch_norm: bool) -> Self {
        ParamGroup {
            layers,
            batch_norm,
            options: ParamGroupOptions::default(),
        }
    }

    pub fn set_lr(&mut self, lr: f32) {
        self.options.lr = Some(lr);
    }

    pub fn get_lr(&self) -> Option<f32> {
        self.options.lr
    }

    /// Sets the momentum, either as plain momentum or as the first beta of an
    /// Adam-like optimizer, whichever the group uses.
    pub fn set_momentum(&mut self, momentum: f32) {
        if let Some((_, beta2)) = self.options.betas {
            self.options.betas = Some((momentum, beta2));
        } else {
            self.options.momentum = Some(momentum);
        }
    }
}
