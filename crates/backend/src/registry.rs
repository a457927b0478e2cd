use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a node type, mirroring how the renderer groups its node entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Shape,
    Shader,
    Light,
    Camera,
    Options,
}

/// Type of a node parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    String,
    Rgb,
    Vector,
    Matrix,
    /// Reference to another node by name.
    Node,
    IntArray,
    PointArray,
}

impl ParamType {
    /// Whether the parameter may be driven by another node's output.
    pub fn linkable(self) -> bool {
        matches!(self, Self::Float | Self::Rgb | Self::Vector | Self::Node)
    }
}

/// Schema of one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub kind: NodeKind,
    pub parameters: BTreeMap<String, ParamType>,
}

impl NodeType {
    pub fn parameter(&self, name: &str) -> Option<ParamType> {
        self.parameters.get(name).copied()
    }
}

/// Node types known to a universe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRegistry {
    types: BTreeMap<String, NodeType>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the node types the preview renderer emits.
    pub fn builtin() -> Self {
        use ParamType::*;

        let mut registry = Self::new();

        // Shaders
        registry.register("flat", NodeKind::Shader, &[("color", Rgb)]);
        registry.register(
            "utility",
            NodeKind::Shader,
            &[("color", Rgb), ("shade_mode", String), ("opacity", Float)],
        );
        registry.register(
            "standard",
            NodeKind::Shader,
            &[
                ("Kd", Float),
                ("Kd_color", Rgb),
                ("Ks", Float),
                ("Ks_color", Rgb),
                ("specular_roughness", Float),
                ("emission", Float),
                ("emission_color", Rgb),
                ("opacity", Rgb),
            ],
        );
        registry.register(
            "noise",
            NodeKind::Shader,
            &[
                ("octaves", Int),
                ("distortion", Float),
                ("lacunarity", Float),
                ("amplitude", Float),
                ("scale", Vector),
                ("color1", Rgb),
                ("color2", Rgb),
            ],
        );
        registry.register(
            "image",
            NodeKind::Shader,
            &[("filename", String), ("multiply", Rgb), ("offset", Rgb)],
        );

        // Lights
        let common_light = [
            ("matrix", Matrix),
            ("color", Rgb),
            ("intensity", Float),
            ("exposure", Float),
            ("samples", Int),
        ];
        registry.register_with(
            "point_light",
            NodeKind::Light,
            &common_light,
            &[("radius", Float)],
        );
        registry.register_with(
            "distant_light",
            NodeKind::Light,
            &common_light,
            &[("angle", Float)],
        );
        registry.register_with(
            "spot_light",
            NodeKind::Light,
            &common_light,
            &[("cone_angle", Float), ("penumbra_angle", Float), ("radius", Float)],
        );
        registry.register_with("quad_light", NodeKind::Light, &common_light, &[]);

        // Shapes
        registry.register(
            "polymesh",
            NodeKind::Shape,
            &[
                ("matrix", Matrix),
                ("shader", Node),
                ("nsides", IntArray),
                ("vidxs", IntArray),
                ("vlist", PointArray),
                ("matte", Bool),
                ("opaque", Bool),
            ],
        );

        // Cameras and options
        registry.register(
            "persp_camera",
            NodeKind::Camera,
            &[("matrix", Matrix), ("fov", Float)],
        );
        registry.register(
            "options",
            NodeKind::Options,
            &[
                ("xres", Int),
                ("yres", Int),
                ("camera", Node),
                ("AA_samples", Int),
                ("GI_diffuse_depth", Int),
                ("GI_specular_depth", Int),
                ("threads", Int),
            ],
        );

        registry
    }

    /// Register (or replace) a node type.
    pub fn register(&mut self, name: &str, kind: NodeKind, parameters: &[(&str, ParamType)]) {
        self.register_with(name, kind, parameters, &[]);
    }

    fn register_with(
        &mut self,
        name: &str,
        kind: NodeKind,
        shared: &[(&str, ParamType)],
        own: &[(&str, ParamType)],
    ) {
        let parameters = shared
            .iter()
            .chain(own)
            .map(|(n, t)| (n.to_string(), *t))
            .collect();
        self.types
            .insert(name.to_string(), NodeType { kind, parameters });
    }

    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names of the given kind, in sorted order.
    pub fn type_names(&self, kind: NodeKind) -> Vec<&str> {
        self.types
            .iter()
            .filter(|(_, t)| t.kind == kind)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
