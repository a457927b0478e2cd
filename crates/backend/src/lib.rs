//! Renderer universe: the native scene graph the preview renderer writes into.
//!
//! # Invariants
//! - Node names are unique within a universe.
//! - Every parameter value is checked against the node type's schema.
//! - Nodes iterate in creation order, so exports are deterministic.

pub mod registry;
pub mod scene_file;
pub mod universe;

pub use registry::{NodeKind, NodeRegistry, NodeType, ParamType};
pub use scene_file::{SCENE_FORMAT_VERSION, SceneFileError, SceneHeader};
pub use universe::{BackendError, Node, NodeFactory, NodeId, OPTIONS_NODE, Universe, Value};

pub fn crate_info() -> &'static str {
    "scenepreview-backend v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("backend"));
    }
}
