use crate::attributes::{
    AttributeSet, AttributeValue, LIGHT_ATTRIBUTE, MATTE_ATTRIBUTE, OPAQUE_ATTRIBUTE,
    SURFACE_ATTRIBUTE,
};
use crate::config::RendererConfig;
use crate::primitive::{Camera, Primitive};
use glam::{Mat4, UVec2};
use scenepreview_backend::{
    BackendError, NodeFactory, NodeId, NodeKind, NodeRegistry, SceneFileError, SceneHeader,
    Universe, Value,
};
use scenepreview_common::{ParameterValue, SessionId};
use scenepreview_shading::{ShaderBinding, ShaderCache, ShaderError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Errors from the preview renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("shader error: {0}")]
    Shader(#[from] ShaderError),
    #[error("renderer error: {0}")]
    Backend(#[from] BackendError),
    #[error("scene description error: {0}")]
    SceneFile(#[from] SceneFileError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("object {0:?} not found")]
    UnknownObject(ObjectHandle),
    #[error("attribute block {0} not found")]
    UnknownAttributes(u64),
    #[error("resolution {0} is too large to export")]
    ResolutionOutOfRange(UVec2),
    #[error("invalid primitive: {0}")]
    InvalidPrimitive(String),
    #[error("scene description renders need an output path")]
    MissingOutput,
    #[error("unknown renderer type {0:?}")]
    UnknownRendererType(String),
}

/// What `render` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderType {
    /// Finalize once and render.
    Batch,
    /// Finalize on every `render`; edits may continue in between.
    Interactive,
    /// Finalize and write a scene-description file instead of rendering.
    SceneDescription,
}

/// Identifies an object, light or camera created through a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// The caller's reference to an attribute block.
///
/// Assign it to any number of objects with [`Renderer::set_attributes`] and
/// give it back with [`Renderer::release_attributes`] once no more objects
/// need it.
#[must_use = "attribute blocks must be released with `release_attributes`"]
#[derive(Debug, PartialEq, Eq)]
pub struct AttributesHandle(u64);

impl AttributesHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Counts reported by `render`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub render_type: RenderType,
    pub shapes: usize,
    pub lights: usize,
    pub cameras: usize,
    /// Shader nodes present in the renderer after finalize.
    pub shader_nodes: usize,
    /// Cached shader networks still referenced.
    pub live_networks: usize,
    /// Cached shader networks removed by this render.
    pub collected_networks: usize,
    /// Scene description written by this render, if any.
    pub output: Option<PathBuf>,
    pub header: Option<SceneHeader>,
}

impl std::fmt::Display for RenderSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: shapes={} lights={} cameras={} shader_nodes={} live_networks={} collected={}",
            self.render_type,
            self.shapes,
            self.lights,
            self.cameras,
            self.shader_nodes,
            self.live_networks,
            self.collected_networks
        )?;
        if let Some(path) = &self.output {
            write!(f, " output={}", path.display())?;
        }
        Ok(())
    }
}

/// Scene-description API implemented by every renderer backend.
///
/// Building and exporting are separate phases: objects, lights, cameras,
/// options and attributes are declared first, then `render` finalizes the
/// scene (dropping unused shaders) and exports it.
pub trait Renderer {
    fn render_type(&self) -> RenderType;

    /// Set a global option. Options the renderer does not know are ignored
    /// with a warning.
    fn option(&mut self, name: &str, value: ParameterValue) -> Result<(), RenderError>;

    fn camera(&mut self, name: &str, camera: &Camera) -> Result<ObjectHandle, RenderError>;

    /// Declare a light. Its type comes from the `ai:light` attribute.
    fn light(&mut self, name: &str) -> Result<ObjectHandle, RenderError>;

    /// Declare a shape. Names need not be unique; a repeated name gets a
    /// suffixed renderer node name.
    fn object(&mut self, name: &str, primitive: &Primitive) -> Result<ObjectHandle, RenderError>;

    /// Build an attribute block. Shader networks are deduplicated.
    fn attributes(&mut self, attributes: &AttributeSet) -> Result<AttributesHandle, RenderError>;

    fn release_attributes(&mut self, attributes: AttributesHandle);

    /// Bind an object to an attribute block, replacing its previous one.
    fn set_attributes(
        &mut self,
        object: ObjectHandle,
        attributes: &AttributesHandle,
    ) -> Result<(), RenderError>;

    fn set_transform(&mut self, object: ObjectHandle, transform: Mat4) -> Result<(), RenderError>;

    /// Remove an object and drop its attribute reference.
    fn remove(&mut self, object: ObjectHandle) -> Result<(), RenderError>;

    fn render(&mut self) -> Result<RenderSummary, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    Shape,
    Light,
    Camera,
}

#[derive(Debug)]
struct ObjectRecord {
    name: String,
    /// Renderer node name. Differs from `name` when another object already
    /// uses that name.
    node_name: String,
    kind: ObjectKind,
    /// Lights have no node until a light shader is bound.
    node: Option<NodeId>,
    attributes: Option<u64>,
    transform: Option<Mat4>,
}

#[derive(Debug)]
struct CameraRecord {
    camera: Camera,
    node_name: String,
}

#[derive(Debug, Default)]
struct AttributeBlock {
    surface: Option<ShaderBinding>,
    light: Option<ShaderBinding>,
    matte: Option<bool>,
    opaque: Option<bool>,
    refs: usize,
}

/// Renderer writing into an in-memory [`Universe`].
pub struct PreviewRenderer {
    config: RendererConfig,
    render_type: RenderType,
    output: Option<PathBuf>,
    session: SessionId,
    universe: Universe,
    cache: ShaderCache,
    objects: BTreeMap<u64, ObjectRecord>,
    blocks: BTreeMap<u64, AttributeBlock>,
    cameras: HashMap<String, CameraRecord>,
    render_camera: Option<String>,
    next_object: u64,
    next_block: u64,
}

impl PreviewRenderer {
    pub fn new(
        render_type: RenderType,
        output: Option<&Path>,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        Self::with_node_registry(render_type, output, config, NodeRegistry::builtin())
    }

    /// Create a renderer whose universe knows the node types in `registry`.
    pub fn with_node_registry(
        render_type: RenderType,
        output: Option<&Path>,
        config: RendererConfig,
        registry: NodeRegistry,
    ) -> Result<Self, RenderError> {
        if render_type == RenderType::SceneDescription && output.is_none() {
            return Err(RenderError::MissingOutput);
        }
        let session = SessionId::new();
        tracing::debug!(%session, ?render_type, "preview renderer created");
        Ok(Self {
            cache: ShaderCache::new(config.cache.clone()),
            config,
            render_type,
            output: output.map(Path::to_path_buf),
            session,
            universe: Universe::new(registry),
            objects: BTreeMap::new(),
            blocks: BTreeMap::new(),
            cameras: HashMap::new(),
            render_camera: None,
            next_object: 0,
            next_block: 0,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The renderer's scene graph.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn cache(&self) -> &ShaderCache {
        &self.cache
    }

    /// Number of attribute blocks still referenced.
    pub fn attribute_block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Claim the node name for a new object. Names are shared with the shader
    /// cache, so a light claimed here is never taken by a shader node before
    /// the light itself is created.
    fn claim_node_name(&mut self, name: &str) -> String {
        let universe = &self.universe;
        let node_name = self
            .cache
            .claim_name(name, |candidate| universe.lookup(candidate).is_some());
        if node_name != name {
            tracing::debug!(object = name, node = %node_name, "object name in use, node renamed");
        }
        node_name
    }

    fn insert_object(
        &mut self,
        name: &str,
        node_name: String,
        kind: ObjectKind,
        node: Option<NodeId>,
    ) -> ObjectHandle {
        let handle = ObjectHandle(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            handle.0,
            ObjectRecord {
                name: name.to_string(),
                node_name,
                kind,
                node,
                attributes: None,
                transform: None,
            },
        );
        handle
    }

    fn bind_shader(
        &mut self,
        attribute: &str,
        value: &AttributeValue,
    ) -> Result<Option<ShaderBinding>, ShaderError> {
        match value {
            AttributeValue::Shader(network) => self
                .cache
                .attributes(&mut self.universe, network, attribute)
                .map(Some),
            _ => {
                tracing::warn!(attribute, "expected a shader network; attribute ignored");
                Ok(None)
            }
        }
    }

    fn release_block(&mut self, block: AttributeBlock) {
        for binding in [block.surface, block.light].into_iter().flatten() {
            self.cache.release(binding);
        }
    }

    fn unref_block(&mut self, id: u64) {
        let unused = match self.blocks.get_mut(&id) {
            Some(block) => {
                block.refs -= 1;
                block.refs == 0
            }
            None => false,
        };
        if unused {
            if let Some(block) = self.blocks.remove(&id) {
                tracing::trace!(block = id, "attribute block released");
                self.release_block(block);
            }
        }
    }

    /// Push an attribute block's state onto an object's renderer node.
    fn apply_block(&mut self, object: ObjectHandle, block_id: u64) -> Result<(), RenderError> {
        let record = self
            .objects
            .get(&object.0)
            .ok_or(RenderError::UnknownObject(object))?;
        let block = self
            .blocks
            .get(&block_id)
            .ok_or(RenderError::UnknownAttributes(block_id))?;

        match record.kind {
            ObjectKind::Shape => {
                let Some(node) = record.node else {
                    return Ok(());
                };
                let shader = block
                    .surface
                    .as_ref()
                    .and_then(|b| self.cache.get(b).output_shader());
                match shader {
                    Some(shader) => {
                        self.universe
                            .set_parameter(node, "shader", Value::Node(shader.to_string()))?;
                    }
                    None => {
                        self.universe.clear_parameter(node, "shader")?;
                    }
                }
                for (parameter, flag) in [("matte", block.matte), ("opaque", block.opaque)] {
                    match flag {
                        Some(v) => self.universe.set_parameter(node, parameter, Value::Bool(v))?,
                        None => {
                            self.universe.clear_parameter(node, parameter)?;
                        }
                    }
                }
            }
            ObjectKind::Light => {
                let template = block
                    .light
                    .as_ref()
                    .and_then(|b| self.cache.get(b).light_template())
                    .cloned();
                let name = record.node_name.clone();
                let transform = record.transform;

                if let Some(old) = record.node {
                    self.universe.remove_node(old)?;
                    if let Some(record) = self.objects.get_mut(&object.0) {
                        record.node = None;
                    }
                }
                let Some(template) = template else {
                    tracing::warn!(light = %name, "light has no light shader and will not be exported");
                    return Ok(());
                };

                let id = self.universe.create_node(&template.type_name, &name)?;
                let mut parameters = template.parameters;
                if let Some(m) = transform {
                    parameters.push(("matrix".to_string(), Value::Matrix(m.to_cols_array())));
                }
                for (parameter, value) in parameters {
                    if let Err(err) = self.universe.set_parameter(id, &parameter, value) {
                        self.universe.remove_node(id)?;
                        return Err(err.into());
                    }
                }
                if let Some(record) = self.objects.get_mut(&object.0) {
                    record.node = Some(id);
                }
            }
            ObjectKind::Camera => {}
        }
        Ok(())
    }

    fn apply_camera_options(&mut self) -> Result<(), RenderError> {
        let options = self.universe.options();
        let camera = self
            .render_camera
            .as_ref()
            .and_then(|name| self.cameras.get(name));

        let resolution = match camera {
            Some(record) => {
                self.universe
                    .set_parameter(options, "camera", Value::Node(record.node_name.clone()))?;
                record.camera.resolution
            }
            None => {
                if let Some(name) = &self.render_camera {
                    tracing::warn!(camera = %name, "render camera does not exist; using defaults");
                }
                self.universe.clear_parameter(options, "camera")?;
                self.config.default_resolution
            }
        };
        let (Ok(xres), Ok(yres)) = (i32::try_from(resolution.x), i32::try_from(resolution.y)) else {
            return Err(RenderError::ResolutionOutOfRange(resolution));
        };
        self.universe.set_parameter(options, "xres", Value::Int(xres))?;
        self.universe.set_parameter(options, "yres", Value::Int(yres))?;
        Ok(())
    }
}

/// Convert an option value to a node value. Links have no meaning here.
fn option_value(value: &ParameterValue) -> Option<Value> {
    Some(match value {
        ParameterValue::Bool(v) => Value::Bool(*v),
        ParameterValue::Int(v) => Value::Int(*v),
        ParameterValue::Float(v) => Value::Float(*v),
        ParameterValue::String(v) => Value::String(v.clone()),
        ParameterValue::Color(c) => Value::Rgb(c.to_array()),
        ParameterValue::Vector(v) => Value::Vector(v.to_array()),
        ParameterValue::Link(_) => return None,
    })
}

impl Renderer for PreviewRenderer {
    fn render_type(&self) -> RenderType {
        self.render_type
    }

    fn option(&mut self, name: &str, value: ParameterValue) -> Result<(), RenderError> {
        if name == "camera" {
            match value {
                ParameterValue::String(camera) => self.render_camera = Some(camera),
                other => {
                    tracing::warn!(value = other.type_name(), "camera option must be a string");
                }
            }
            return Ok(());
        }

        let Some(parameter) = name.strip_prefix("ai:") else {
            tracing::debug!(option = name, "option for another renderer ignored");
            return Ok(());
        };
        let Some(value) = option_value(&value) else {
            tracing::warn!(option = name, "links are not valid option values");
            return Ok(());
        };

        let options = self.universe.options();
        match self.universe.set_parameter(options, parameter, value) {
            Ok(()) => Ok(()),
            Err(BackendError::ParameterRejected { reason, .. }) => {
                tracing::warn!(option = name, %reason, "unsupported option ignored");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn camera(&mut self, name: &str, camera: &Camera) -> Result<ObjectHandle, RenderError> {
        let node_name = self.claim_node_name(name);
        let node = match self.universe.create_node("persp_camera", &node_name) {
            Ok(node) => node,
            Err(err) => {
                self.cache.release_name(&node_name);
                return Err(err.into());
            }
        };
        self.universe.set_parameter(node, "fov", Value::Float(camera.fov))?;
        self.cameras.insert(
            name.to_string(),
            CameraRecord {
                camera: *camera,
                node_name: node_name.clone(),
            },
        );
        Ok(self.insert_object(name, node_name, ObjectKind::Camera, Some(node)))
    }

    fn light(&mut self, name: &str) -> Result<ObjectHandle, RenderError> {
        let node_name = self.claim_node_name(name);
        Ok(self.insert_object(name, node_name, ObjectKind::Light, None))
    }

    fn object(&mut self, name: &str, primitive: &Primitive) -> Result<ObjectHandle, RenderError> {
        let node_name = self.claim_node_name(name);
        let node = match self.universe.create_node("polymesh", &node_name) {
            Ok(node) => node,
            Err(err) => {
                self.cache.release_name(&node_name);
                return Err(err.into());
            }
        };
        match primitive {
            Primitive::Mesh(mesh) => {
                self.universe.set_parameter(
                    node,
                    "nsides",
                    Value::IntArray(mesh.vertices_per_face().to_vec()),
                )?;
                self.universe
                    .set_parameter(node, "vidxs", Value::IntArray(mesh.vertex_ids().to_vec()))?;
                self.universe.set_parameter(
                    node,
                    "vlist",
                    Value::PointArray(mesh.points().iter().map(|p| p.to_array()).collect()),
                )?;
            }
        }
        Ok(self.insert_object(name, node_name, ObjectKind::Shape, Some(node)))
    }

    fn attributes(&mut self, attributes: &AttributeSet) -> Result<AttributesHandle, RenderError> {
        let mut block = AttributeBlock {
            refs: 1,
            ..Default::default()
        };

        for (name, value) in attributes.iter() {
            match name {
                SURFACE_ATTRIBUTE | LIGHT_ATTRIBUTE => {}
                MATTE_ATTRIBUTE | OPAQUE_ATTRIBUTE => {
                    let flag = match value {
                        AttributeValue::Bool(v) => Some(*v),
                        _ => {
                            tracing::warn!(attribute = name, "expected a bool; attribute ignored");
                            None
                        }
                    };
                    if name == MATTE_ATTRIBUTE {
                        block.matte = flag;
                    } else {
                        block.opaque = flag;
                    }
                    continue;
                }
                _ => {
                    if matches!(value, AttributeValue::Shader(_)) {
                        tracing::warn!(attribute = name, "unsupported shader attribute ignored");
                    }
                    continue;
                }
            };
            match self.bind_shader(name, value) {
                Ok(binding) if name == SURFACE_ATTRIBUTE => block.surface = binding,
                Ok(binding) => block.light = binding,
                Err(err) => {
                    self.release_block(block);
                    return Err(err.into());
                }
            }
        }

        let id = self.next_block;
        self.next_block += 1;
        self.blocks.insert(id, block);
        Ok(AttributesHandle(id))
    }

    fn release_attributes(&mut self, attributes: AttributesHandle) {
        self.unref_block(attributes.0);
    }

    fn set_attributes(
        &mut self,
        object: ObjectHandle,
        attributes: &AttributesHandle,
    ) -> Result<(), RenderError> {
        self.apply_block(object, attributes.0)?;

        if let Some(block) = self.blocks.get_mut(&attributes.0) {
            block.refs += 1;
        }
        let previous = self
            .objects
            .get_mut(&object.0)
            .and_then(|record| record.attributes.replace(attributes.0));
        if let Some(previous) = previous {
            self.unref_block(previous);
        }
        Ok(())
    }

    fn set_transform(&mut self, object: ObjectHandle, transform: Mat4) -> Result<(), RenderError> {
        let record = self
            .objects
            .get_mut(&object.0)
            .ok_or(RenderError::UnknownObject(object))?;
        record.transform = Some(transform);
        if let Some(node) = record.node {
            self.universe
                .set_parameter(node, "matrix", Value::Matrix(transform.to_cols_array()))?;
        }
        Ok(())
    }

    fn remove(&mut self, object: ObjectHandle) -> Result<(), RenderError> {
        let record = self
            .objects
            .remove(&object.0)
            .ok_or(RenderError::UnknownObject(object))?;
        if let Some(node) = record.node {
            self.universe.remove_node(node)?;
        }
        if record.kind == ObjectKind::Camera
            && self
                .cameras
                .get(&record.name)
                .is_some_and(|camera| camera.node_name == record.node_name)
        {
            self.cameras.remove(&record.name);
        }
        self.cache.release_name(&record.node_name);
        if let Some(block) = record.attributes {
            self.unref_block(block);
        }
        Ok(())
    }

    fn render(&mut self) -> Result<RenderSummary, RenderError> {
        let _span = tracing::info_span!("render", render_type = ?self.render_type).entered();

        let report = self.cache.finalize(&mut self.universe)?;
        self.apply_camera_options()?;

        let unlit = self
            .objects
            .values()
            .filter(|o| o.kind == ObjectKind::Light && o.node.is_none())
            .count();
        if unlit > 0 {
            tracing::warn!(unlit, "lights without a light shader were skipped");
        }

        let header = match self.render_type {
            RenderType::SceneDescription => {
                let path = self.output.as_deref().ok_or(RenderError::MissingOutput)?;
                Some(self.universe.save(path, self.session)?)
            }
            RenderType::Batch | RenderType::Interactive => None,
        };

        let summary = RenderSummary {
            render_type: self.render_type,
            shapes: self.universe.count(NodeKind::Shape),
            lights: self.universe.count(NodeKind::Light),
            cameras: self.universe.count(NodeKind::Camera),
            shader_nodes: self.universe.count(NodeKind::Shader),
            live_networks: report.live.len(),
            collected_networks: report.collected.len(),
            output: header.as_ref().and(self.output.clone()),
            header,
        };
        tracing::info!(%summary, "render complete");
        Ok(summary)
    }
}
