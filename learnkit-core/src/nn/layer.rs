use crate::error::LearnError;
use std::sync::{Arc, RwLock};

/// A leaf layer of a model, as seen by the training loop.
///
/// The loop only needs to toggle gradient tracking for the layer's
/// parameters and to recognise batch-normalization layers, whose running
/// statistics usually keep training while the rest of the model is frozen.
pub trait Layer: std::fmt::Debug + Send + Sync {
    /// Name of the layer, unique within its model.
    fn name(&self) -> &str;

    /// Whether this is a batch-normalization layer.
    fn is_batch_norm(&self) -> bool {
        false
    }

    /// Whether the layer's parameters currently track gradients.
    fn requires_grad(&self) -> bool;

    /// Enables or disables gradient tracking for all of the layer's parameters.
    fn set_requires_grad(&mut self, requires_grad: bool);

    /// Number of learnable parameter tensors held by the layer.
    fn num_parameters(&self) -> usize;
}

/// Layers are shared between the model, the layer groups and the optimizer.
pub type SharedLayer = Arc<RwLock<dyn Layer>>;

/// Wraps a concrete layer into a [`SharedLayer`] handle.
pub fn shared<L: Layer + 'static>(layer: L) -> SharedLayer {
    Arc::new(RwLock::new(layer))
}

/// Identity comparison of two layer handles.
pub fn same_layer(a: &SharedLayer, b: &SharedLayer) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Sets gradient tracking on a shared layer.
pub fn set_requires_grad(layer: &SharedLayer, requires_grad: bool) -> Result<(), LearnError> {
    let mut guard = layer
        .write()
        .map_err(|e| LearnError::lock("write", format!("layer lock poisoned: {}", e)))?;
    guard.set_requires_grad(requires_grad);
    Ok(())
}

/// Reads `(name, is_batch_norm, requires_grad)` from a shared layer.
pub fn describe(layer: &SharedLayer) -> Result<(String, bool, bool), LearnError> {
    let guard = layer
        .read()
        .map_err(|e| LearnError::lock("read", format!("layer lock poisoned: {}", e)))?;
    Ok((
        guard.name().to_string(),
        guard.is_batch_norm(),
        guard.requires_grad(),
    ))
}
