use crate::renderer::RenderError;
use glam::UVec2;
use scenepreview_shading::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Renderer configuration.
///
/// ```yaml
/// cache:
///   scope: global        # or per_slot
///   name_prefix: shader
/// default_resolution: [640, 480]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub cache: CacheConfig,
    /// Image size used when no render camera provides one.
    pub default_resolution: UVec2,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            default_resolution: UVec2::new(640, 480),
        }
    }
}

impl RendererConfig {
    pub fn from_yaml(text: &str) -> Result<Self, RenderError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}
