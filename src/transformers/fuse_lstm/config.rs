//! Configuration of the LSTM rewrite

use crate::error::{OnnxResult, TransformError};
use crate::proto::ModelProto;
use crate::{SUPPORTED_OPSET_MAX, SUPPORTED_OPSET_MIN};

/// Opset assumed when a model does not declare one
pub const DEFAULT_TARGET_OPSET: i64 = 9;

/// Options of [`FuseLstm`](super::FuseLstm)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseLstmConfig {
    /// Opset whose encoding the glue nodes follow
    pub target_opset: i64,
    /// Remove nodes left unreachable after fusion
    pub prune_dead_nodes: bool,
}

impl Default for FuseLstmConfig {
    fn default() -> Self {
        Self {
            target_opset: DEFAULT_TARGET_OPSET,
            prune_dead_nodes: true,
        }
    }
}

impl FuseLstmConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the target opset from the model's default-domain import
    pub fn from_model(model: &ModelProto) -> OnnxResult<Self> {
        let config = Self::default().with_target_opset(
            model.get_opset_version().unwrap_or(DEFAULT_TARGET_OPSET),
        );
        config.validate()?;
        Ok(config)
    }

    /// Set the target opset
    pub fn with_target_opset(mut self, opset: i64) -> Self {
        self.target_opset = opset;
        self
    }

    /// Enable or disable dead-node pruning
    pub fn with_prune_dead_nodes(mut self, enable: bool) -> Self {
        self.prune_dead_nodes = enable;
        self
    }

    /// Check the target opset against the supported range
    pub fn validate(&self) -> OnnxResult<()> {
        if (SUPPORTED_OPSET_MIN..=SUPPORTED_OPSET_MAX).contains(&self.target_opset) {
            Ok(())
        } else {
            Err(TransformError::UnsupportedOpset {
                version: self.target_opset,
                min: SUPPORTED_OPSET_MIN,
                max: SUPPORTED_OPSET_MAX,
            })
        }
    }
}
