// learnkit-train/src/config.rs

use crate::handler::DEFAULT_SMOOTH_BETA;
use learnkit_core::LearnError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Learner-wide settings. Missing JSON fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Decoupled weight decay (scale parameters before each step).
    pub true_wd: bool,
    /// Apply weight decay to batch-norm layers too.
    pub bn_wd: bool,
    /// Weight decay used when a fit does not give one.
    pub wd: f32,
    /// Keep batch-norm layers trainable in frozen groups.
    pub train_bn: bool,
    pub model_dir: PathBuf,
    pub default_lr: f32,
    /// Target key that marks a batch as labeled.
    pub label_key: String,
    /// Beta of the smoothed training loss.
    pub smooth_beta: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            true_wd: true,
            bn_wd: true,
            wd: 1e-2,
            train_bn: true,
            model_dir: PathBuf::from("model"),
            default_lr: 3e-3,
            label_key: "label".to_string(),
            smooth_beta: DEFAULT_SMOOTH_BETA,
        }
    }
}

impl LearnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn true_wd(mut self, true_wd: bool) -> Self {
        self.true_wd = true_wd;
        self
    }

    pub fn bn_wd(mut self, bn_wd: bool) -> Self {
        self.bn_wd = bn_wd;
        self
    }

    pub fn wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    pub fn train_bn(mut self, train_bn: bool) -> Self {
        self.train_bn = train_bn;
        self
    }

    pub fn model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = model_dir.into();
        self
    }

    pub fn default_lr(mut self, lr: f32) -> Self {
        self.default_lr = lr;
        self
    }

    pub fn label_key(mut self, label_key: impl Into<String>) -> Self {
        self.label_key = label_key.into();
        self
    }

    pub fn smooth_beta(mut self, beta: f32) -> Self {
        self.smooth_beta = beta;
        self
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::Serialization` for malformed JSON or a
    /// `smooth_beta` outside `[0, 1)`.
    pub fn from_json_str(json: &str) -> Result<Self, LearnError> {
        let config: Self = serde_json::from_str(json).map_err(|e| LearnError::Serialization(e.to_string()))?;
        if !(0.0..1.0).contains(&config.smooth_beta) {
            return Err(LearnError::Serialization(format!(
                "smooth_beta must be within [0, 1), got {}",
                config.smooth_beta
            )));
        }
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, LearnError> {
        serde_json::to_string_pretty(self).map_err(|e| LearnError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
