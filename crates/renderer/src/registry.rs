//! Lookup of renderer implementations by type name.

use crate::config::RendererConfig;
use crate::renderer::{PreviewRenderer, RenderError, RenderType, Renderer};
use std::collections::BTreeMap;
use std::path::Path;

/// Type name of the in-memory preview renderer.
pub const PREVIEW_RENDERER: &str = "Preview::Renderer";

/// Constructor stored in a [`RendererRegistry`].
pub type RendererCreator =
    fn(RenderType, Option<&Path>, &RendererConfig) -> Result<Box<dyn Renderer>, RenderError>;

#[derive(Debug, Clone, Default)]
pub struct RendererRegistry {
    creators: BTreeMap<String, RendererCreator>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every renderer this crate provides.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(PREVIEW_RENDERER, create_preview);
        registry
    }

    /// Register `creator` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, creator: RendererCreator) {
        if self.creators.insert(name.to_string(), creator).is_some() {
            tracing::debug!(renderer = name, "renderer registration replaced");
        }
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    pub fn create(
        &self,
        name: &str,
        render_type: RenderType,
        output: Option<&Path>,
        config: &RendererConfig,
    ) -> Result<Box<dyn Renderer>, RenderError> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| RenderError::UnknownRendererType(name.to_string()))?;
        tracing::debug!(renderer = name, ?render_type, "creating renderer");
        creator(render_type, output, config)
    }
}

fn create_preview(
    render_type: RenderType,
    output: Option<&Path>,
    config: &RendererConfig,
) -> Result<Box<dyn Renderer>, RenderError> {
    Ok(Box::new(PreviewRenderer::new(
        render_type,
        output,
        config.clone(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_preview() {
        let registry = RendererRegistry::builtin();
        assert!(registry.contains(PREVIEW_RENDERER));
        assert_eq!(registry.types().collect::<Vec<_>>(), vec![PREVIEW_RENDERER]);
    }

    #[test]
    fn creates_requested_render_type() {
        let registry = RendererRegistry::builtin();
        let renderer = registry
            .create(PREVIEW_RENDERER, RenderType::Interactive, None, &RendererConfig::default())
            .unwrap();
        assert_eq!(renderer.render_type(), RenderType::Interactive);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = RendererRegistry::builtin();
        let err = registry
            .create("Cycles::Renderer", RenderType::Batch, None, &RendererConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::UnknownRendererType(name) if name == "Cycles::Renderer"));
    }

    #[test]
    fn creator_errors_propagate() {
        let registry = RendererRegistry::builtin();
        let err = registry
            .create(PREVIEW_RENDERER, RenderType::SceneDescription, None, &RendererConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::MissingOutput));
    }
}
