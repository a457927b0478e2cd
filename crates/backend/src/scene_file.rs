//! Scene-description files.
//!
//! A scene description is a JSON document:
//! ```text
//! {
//!   "header": { "format_version", "session", "node_count", "checksum" },
//!   "nodes":  [ { "name", "type_name", "kind", "parameters" }, ... ]
//! }
//! ```
//! Nodes are listed in creation order. The checksum is the SHA-256 of the
//! serialized node list and is verified on load.

use crate::registry::{NodeKind, NodeRegistry};
use crate::universe::{BackendError, Node, NodeFactory, OPTIONS_NODE, Universe};
use scenepreview_common::SessionId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current scene-description format version.
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Errors from writing or reading scene descriptions.
#[derive(Debug, thiserror::Error)]
pub enum SceneFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("format version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("invalid node in scene description: {0}")]
    Backend(#[from] BackendError),
}

/// Header of a scene-description file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneHeader {
    pub format_version: u32,
    pub session: SessionId,
    pub node_count: usize,
    pub checksum: String,
}

#[derive(Serialize, Deserialize)]
struct SceneDocument {
    header: SceneHeader,
    nodes: Vec<Node>,
}

impl Universe {
    /// Write every node to a scene-description file.
    pub fn save(&self, path: impl AsRef<Path>, session: SessionId) -> Result<SceneHeader, SceneFileError> {
        let nodes: Vec<Node> = self.nodes().map(|(_, n)| n.clone()).collect();
        let header = SceneHeader {
            format_version: SCENE_FORMAT_VERSION,
            session,
            node_count: nodes.len(),
            checksum: nodes_checksum(&nodes)?,
        };
        let document = SceneDocument {
            header: header.clone(),
            nodes,
        };
        let mut writer = BufWriter::new(std::fs::File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;
        tracing::debug!(
            path = %path.as_ref().display(),
            nodes = header.node_count,
            "scene description written"
        );
        Ok(header)
    }

    /// Load a scene-description file into a fresh universe.
    ///
    /// Every node is validated against `registry`, exactly as if it had been
    /// created through the [`NodeFactory`] interface.
    pub fn load(
        path: impl AsRef<Path>,
        registry: NodeRegistry,
    ) -> Result<(Self, SceneHeader), SceneFileError> {
        let file = std::fs::File::open(path.as_ref())?;
        let document: SceneDocument = serde_json::from_reader(BufReader::new(file))?;
        let header = document.header;

        if header.format_version != SCENE_FORMAT_VERSION {
            return Err(SceneFileError::SchemaMismatch {
                file_version: header.format_version,
                expected_version: SCENE_FORMAT_VERSION,
            });
        }
        let actual = nodes_checksum(&document.nodes)?;
        if actual != header.checksum {
            return Err(SceneFileError::IntegrityMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let mut universe = Universe::new(registry);

        // Create every node first so links can point forward.
        let mut ids = Vec::with_capacity(document.nodes.len());
        for node in &document.nodes {
            let id = if node.kind == NodeKind::Options && node.name == OPTIONS_NODE {
                universe.options()
            } else {
                universe.create_node(&node.type_name, &node.name)?
            };
            ids.push(id);
        }
        for (id, node) in ids.into_iter().zip(document.nodes) {
            for (name, value) in node.parameters {
                universe.set_parameter(id, &name, value)?;
            }
        }

        Ok((universe, header))
    }
}

fn nodes_checksum(nodes: &[Node]) -> Result<String, SceneFileError> {
    let bytes = serde_json::to_vec(nodes)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Value;

    fn sample_universe() -> Universe {
        let mut u = Universe::default();
        let noise = u.create_node("noise", "noise1").unwrap();
        u.set_parameter(noise, "octaves", Value::Int(3)).unwrap();
        let flat = u.create_node("flat", "flat1").unwrap();
        u.set_parameter(flat, "color", Value::Node("noise1".into())).unwrap();
        let mesh = u.create_node("polymesh", "plane").unwrap();
        u.set_parameter(mesh, "shader", Value::Node("flat1".into())).unwrap();
        u
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        let u = sample_universe();
        let session = SessionId::new();
        let written = u.save(&path, session).unwrap();
        assert_eq!(written.node_count, 4);

        let (loaded, header) = Universe::load(&path, NodeRegistry::builtin()).unwrap();
        assert_eq!(header, written);
        assert_eq!(header.session, session);
        assert_eq!(loaded.len(), u.len());
        assert_eq!(
            loaded.node_by_name("plane").unwrap().parameter("shader"),
            Some(&Value::Node("flat1".into()))
        );
        assert_eq!(loaded.count(NodeKind::Shader), 2);
    }

    #[test]
    fn load_forward_links() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        let mut u = Universe::default();
        let camera = u.create_node("persp_camera", "cam").unwrap();
        u.set_parameter(camera, "fov", Value::Float(45.0)).unwrap();
        let options = u.options();
        u.set_parameter(options, "camera", Value::Node("cam".into())).unwrap();
        u.save(&path, SessionId::new()).unwrap();

        let (loaded, _) = Universe::load(&path, NodeRegistry::builtin()).unwrap();
        let options = loaded.node(loaded.options()).unwrap();
        assert_eq!(options.parameter("camera"), Some(&Value::Node("cam".into())));
    }

    #[test]
    fn load_fails_closed_on_tampering() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        sample_universe().save(&path, SessionId::new()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("noise1", "noise2")).unwrap();

        let err = Universe::load(&path, NodeRegistry::builtin()).unwrap_err();
        assert!(matches!(err, SceneFileError::IntegrityMismatch { .. }));
    }

    #[test]
    fn load_rejects_other_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        sample_universe().save(&path, SessionId::new()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(
            &path,
            text.replace("\"format_version\": 1", "\"format_version\": 99"),
        )
        .unwrap();

        let err = Universe::load(&path, NodeRegistry::builtin()).unwrap_err();
        assert!(matches!(
            err,
            SceneFileError::SchemaMismatch {
                file_version: 99,
                ..
            }
        ));
    }

    #[test]
    fn load_validates_against_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        sample_universe().save(&path, SessionId::new()).unwrap();

        let err = Universe::load(&path, NodeRegistry::new()).unwrap_err();
        assert!(matches!(
            err,
            SceneFileError::Backend(BackendError::UnknownNodeType(_))
        ));
    }
}
