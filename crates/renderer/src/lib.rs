//! Preview renderer: the scene-description API on top of the shader cache.
//!
//! # Invariants
//! - The renderer never removes shader nodes itself; the cache does, at finalize.
//! - Attribute blocks are reference counted; a block reaching zero gives its
//!   shader bindings back to the cache.
//! - Build and export are separate phases: nothing is exported until `render`.

pub mod attributes;
pub mod config;
pub mod primitive;
pub mod registry;
mod renderer;

pub use attributes::{
    AttributeSet, AttributeValue, LIGHT_ATTRIBUTE, MATTE_ATTRIBUTE, OPAQUE_ATTRIBUTE,
    SURFACE_ATTRIBUTE,
};
pub use config::RendererConfig;
pub use primitive::{Camera, MeshPrimitive, Primitive};
pub use registry::{PREVIEW_RENDERER, RendererCreator, RendererRegistry};
pub use renderer::{
    AttributesHandle, ObjectHandle, PreviewRenderer, RenderError, RenderSummary, RenderType,
    Renderer,
};

pub fn crate_info() -> &'static str {
    "scenepreview-renderer v0.1.0"
}
