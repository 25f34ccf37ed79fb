use crate::device::Device;
use crate::error::LearnError;
use crate::nn::layer::SharedLayer;
use crate::tensor::Tensor;
use std::path::Path;

/// The base trait for models driven by the training loop.
///
/// This trait defines the operations the loop needs from a model: a forward
/// pass over ordered positional inputs, a train/eval mode toggle, access to
/// its leaf layers and a hook to load serialized parameters.
pub trait Model<T: Tensor>: std::fmt::Debug {
    /// Performs a forward pass.
    ///
    /// # Arguments
    /// * `inputs`: The batch inputs, in positional order.
    fn forward(&self, inputs: &[T]) -> Result<T, LearnError>;

    /// Switches between training and evaluation behaviour (dropout,
    /// batch-norm statistics, ...).
    fn set_training(&mut self, training: bool);

    /// Returns `true` while the model is in training mode.
    fn is_training(&self) -> bool;

    /// Enables or disables gradient recording for subsequent forward passes.
    ///
    /// Engines without a global switch can leave the default no-op in place.
    fn set_grad_enabled(&mut self, _enabled: bool) {}

    /// Returns the flattened list of leaf layers, in model order.
    fn layers(&self) -> Vec<SharedLayer>;

    /// Loads serialized parameter state from `path` onto `device`.
    ///
    /// The file format and device placement are decided by the engine.
    fn load_state(&mut self, path: &Path, device: Device) -> Result<(), LearnError>;

    fn train(&mut self) {
        self.set_training(true);
    }

    fn eval(&mut self) {
        self.set_training(false);
    }
}
