// learnkit-core/src/nn/mod.rs
// Model-side boundary: layers, layer groups, models and losses.

pub mod layer;
pub mod layer_group;
pub mod loss;
pub mod model;

pub use layer::{Layer, SharedLayer};
pub use layer_group::{LayerGroup, LayerGroups};
pub use loss::{LossComponent, LossFunction};
pub use model::Model;
