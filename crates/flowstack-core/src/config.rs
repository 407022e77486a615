use serde::{Deserialize, Serialize};

/// Model-level configuration for the fusion pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Apply the learned affine correction to flow fields as well as frames.
    /// The frame path is always active; the flow path is wired but off by
    /// default.
    #[serde(default)]
    pub enable_flow_correction: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enable_flow_correction: false,
        }
    }
}
