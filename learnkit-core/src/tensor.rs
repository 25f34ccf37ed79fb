use crate::error::LearnError;
use std::fmt::Debug;

/// The slice of a tensor/autograd engine that the training loop relies on.
///
/// Implementations are expected to be cheap to clone (shared storage), which
/// is how engines such as candle or tch expose their tensor handles.
pub trait Tensor: Clone + Debug + 'static {
    /// Returns the shape of the tensor.
    fn shape(&self) -> Vec<usize>;

    /// Returns the number of samples held by the tensor, i.e. its leading
    /// dimension. A scalar counts as a single sample.
    fn batch_size(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    /// Returns a copy of the tensor that is detached from the computation graph.
    fn detach(&self) -> Self;

    /// Extracts the value of a single-element tensor.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::Engine` if the tensor holds more than one element.
    fn item(&self) -> Result<f32, LearnError>;

    /// Copies the tensor's elements into a flat vector (row-major).
    fn to_vec(&self) -> Result<Vec<f32>, LearnError>;

    /// Runs back-propagation from this tensor.
    fn backward(&self) -> Result<(), LearnError>;
}
