// learnkit-core/src/nn/layer_group.rs

use crate::error::LearnError;
use crate::nn::layer::{same_layer, SharedLayer};

/// An ordered set of layers that share hyper-parameters (learning rate,
/// weight decay) and are frozen or unfrozen together.
#[derive(Debug, Clone, Default)]
pub struct LayerGroup {
    layers: Vec<SharedLayer>,
}

impl LayerGroup {
    pub fn new(layers: Vec<SharedLayer>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[SharedLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Splits the group into its regular layers and its batch-norm layers,
    /// preserving order within each half.
    pub fn split_batch_norm(&self) -> Result<(Vec<SharedLayer>, Vec<SharedLayer>), LearnError> {
        let mut regular = Vec::new();
        let mut batch_norm = Vec::new();
        for layer in &self.layers {
            let is_bn = layer
                .read()
                .map_err(|e| LearnError::lock("read", format!("layer lock poisoned: {}", e)))?
                .is_batch_norm();
            if is_bn {
                batch_norm.push(layer.clone());
            } else {
                regular.push(layer.clone());
            }
        }
        Ok((regular, batch_norm))
    }
}

/// An ordered partition of a model's layers into disjoint [`LayerGroup`]s.
///
/// Every layer of the model belongs to exactly one group. Group indices are
/// stable for as long as the partition is in use.
#[derive(Debug, Clone)]
pub struct LayerGroups {
    groups: Vec<LayerGroup>,
}

impl LayerGroups {
    /// Puts every layer into one group.
    pub fn single(layers: Vec<SharedLayer>) -> Self {
        Self {
            groups: vec![LayerGroup::new(layers)],
        }
    }

    /// Splits a flat layer list at the given indices.
    ///
    /// `split_points` must be strictly increasing and within `0..=layers.len()`.
    /// A leading `0` and a trailing `layers.len()` are implied, so
    /// `split_at(layers, &[2, 5])` on eight layers yields the groups
    /// `[0, 2)`, `[2, 5)` and `[5, 8)`.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::LayerPartition` if the split points are out of
    /// range or not strictly increasing.
    pub fn split_at(layers: Vec<SharedLayer>, split_points: &[usize]) -> Result<Self, LearnError> {
        if split_points.is_empty() {
            return Ok(Self::single(layers));
        }
        let n = layers.len();
        let mut bounds = Vec::with_capacity(split_points.len() + 2);
        if split_points.first() != Some(&0) {
            bounds.push(0);
        }
        bounds.extend_from_slice(split_points);
        if bounds.last() != Some(&n) {
            bounds.push(n);
        }
        if bounds.len() < 2
            || bounds.windows(2).any(|w| w[0] >= w[1])
            || bounds.iter().any(|&b| b > n)
        {
            return Err(LearnError::LayerPartition(format!(
                "split points {:?} are not strictly increasing within 0..={}",
                split_points, n
            )));
        }
        let groups = bounds
            .windows(2)
            .map(|w| LayerGroup::new(layers[w[0]..w[1]].to_vec()))
            .collect();
        Ok(Self { groups })
    }

    /// Builds a partition from explicit groups, checking that it covers
    /// `model_layers` exactly once.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::LayerPartition` if a model layer is missing, a
    /// layer appears twice, a group contains a layer the model does not own,
    /// or no group is given.
    pub fn from_groups(
        groups: Vec<LayerGroup>,
        model_layers: &[SharedLayer],
    ) -> Result<Self, LearnError> {
        if groups.is_empty() {
            return Err(LearnError::LayerPartition(
                "at least one layer group is required".to_string(),
            ));
        }
        let mut seen: Vec<&SharedLayer> = Vec::new();
        for (gi, group) in groups.iter().enumerate() {
            for layer in group.layers() {
                if !model_layers.iter().any(|m| same_layer(m, layer)) {
                    return Err(LearnError::LayerPartition(format!(
                        "group {} contains a layer that is not part of the model",
                        gi
                    )));
                }
                if seen.iter().any(|s| same_layer(s, layer)) {
                    return Err(LearnError::LayerPartition(format!(
                        "a layer of group {} is assigned to more than one group",
                        gi
                    )));
                }
                seen.push(layer);
            }
        }
        if seen.len() != model_layers.len() {
            return Err(LearnError::LayerPartition(format!(
                "groups cover {} of the model's {} layers",
                seen.len(),
                model_layers.len()
            )));
        }
        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LayerGroup> {
        self.groups.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerGroup> {
        self.groups.iter()
    }

    /// Resolves a possibly negative index (`-1` is the last group).
    ///
    /// # Errors
    ///
    /// Returns `LearnError::LayerGroupIndexOutOfBounds` if the index does not
    /// name a group.
    pub fn resolve_index(&self, index: isize) -> Result<usize, LearnError> {
        let len = self.groups.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Err(LearnError::LayerGroupIndexOutOfBounds {
                index,
                len: self.groups.len(),
            });
        }
        Ok(resolved as usize)
    }

    /// Like [`LayerGroups::resolve_index`] but for a slice boundary, where
    /// `len` itself is also accepted.
    pub fn resolve_boundary(&self, index: isize) -> Result<usize, LearnError> {
        let len = self.groups.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved > len {
            return Err(LearnError::LayerGroupIndexOutOfBounds {
                index,
                len: self.groups.len(),
            });
        }
        Ok(resolved as usize)
    }

    /// Indices of all groups not listed in `indices`, in ascending order.
    pub fn complement(&self, indices: &[usize]) -> Vec<usize> {
        (0..self.groups.len())
            .filter(|i| !indices.contains(i))
            .collect()
    }
}

impl<'a> IntoIterator for &'a LayerGroups {
    type Item = &'a LayerGroup;
    type IntoIter = std::slice::Iter<'a, LayerGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

#[cfg(test)]
#[path = "layer_group_test.rs"]
mod tests;
