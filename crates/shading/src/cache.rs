use crate::key::CacheKey;
use crate::naming::NameRegistry;
use scenepreview_backend::{BackendError, NodeFactory, NodeId, NodeKind, Value};
use scenepreview_common::{ParameterValue, Shader, ShaderNetwork};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Errors from building cached shaders.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("invalid shader type {type_name:?}")]
    InvalidShaderType { type_name: String },
    #[error("shader {shader:?} rejected parameter {parameter:?}: {reason}")]
    ParameterRejected {
        shader: String,
        parameter: String,
        reason: String,
    },
    /// The session naming scheme produced a name the renderer already had.
    /// Never recoverable.
    #[error("shader node name {0:?} collides with an existing node")]
    DuplicateNameCollision(String),
    #[error("renderer error: {0}")]
    Backend(BackendError),
}

impl ShaderError {
    /// Whether the caller may fix the description and try again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::DuplicateNameCollision(_))
    }
}

impl From<BackendError> for ShaderError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnknownNodeType(type_name) => Self::InvalidShaderType { type_name },
            BackendError::ParameterRejected {
                node,
                parameter,
                reason,
            } => Self::ParameterRejected {
                shader: node,
                parameter,
                reason,
            },
            BackendError::DuplicateName(name) => Self::DuplicateNameCollision(name),
            other => Self::Backend(other),
        }
    }
}

/// Whether identical networks in different attribute slots share an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// One entry per network, whatever slot requests it.
    #[default]
    Global,
    /// The slot name is part of the key.
    PerSlot,
}

/// Shader cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub scope: CacheScope,
    /// First component of every backend node name the cache creates.
    pub name_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scope: CacheScope::Global,
            name_prefix: "shader".into(),
        }
    }
}

/// Index of an entry in the cache arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub usize);

/// One counted reference to a cached shader.
///
/// Not `Clone`: every binding accounts for exactly one reference. Use
/// [`ShaderCache::share`] for another one and [`ShaderCache::release`] to
/// give it back.
#[must_use = "dropping a binding leaks its reference; release it instead"]
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderBinding {
    handle: HandleId,
}

impl ShaderBinding {
    pub fn handle(&self) -> HandleId {
        self.handle
    }
}

/// A light output, instantiated once per light object by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LightTemplate {
    pub type_name: String,
    /// Parameters with links already rewritten to backend node names.
    pub parameters: Vec<(String, Value)>,
}

/// What a network's output resolves to in the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderOutput {
    /// A materialized shader node.
    Shader { name: String },
    /// A light the caller instantiates itself.
    Light(LightTemplate),
}

/// A cached, materialized shader network.
#[derive(Debug, Clone)]
pub struct CachedShader {
    key: CacheKey,
    slot: String,
    nodes: Vec<(NodeId, String)>,
    output: ShaderOutput,
    ref_count: usize,
    collected: bool,
}

impl CachedShader {
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Slot of the request that first created this entry.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Backend node names owned by this entry, in creation order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(_, name)| name.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn output(&self) -> &ShaderOutput {
        &self.output
    }

    /// Name of the output shader node, for surface-style outputs.
    pub fn output_shader(&self) -> Option<&str> {
        match &self.output {
            ShaderOutput::Shader { name } => Some(name),
            ShaderOutput::Light(_) => None,
        }
    }

    pub fn light_template(&self) -> Option<&LightTemplate> {
        match &self.output {
            ShaderOutput::Light(template) => Some(template),
            ShaderOutput::Shader { .. } => None,
        }
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Referenced and still present in the renderer.
    pub fn is_live(&self) -> bool {
        !self.collected && self.ref_count > 0
    }
}

/// Counters for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub nodes_created: u64,
    pub nodes_collected: u64,
    pub entries_collected: u64,
}

/// Outcome of [`ShaderCache::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Entries removed from the renderer by this call.
    pub collected: Vec<HandleId>,
    /// Entries that survive, in first-creation order.
    pub live: Vec<HandleId>,
}

/// Deduplicating, reference-counted cache of shader networks.
///
/// The cache owns every entry in an arena; bindings hold arena indices.
/// Entries whose count drops to zero stay in the renderer (and can be revived
/// by a later hit) until [`finalize`](Self::finalize) sweeps them.
#[derive(Debug, Default)]
pub struct ShaderCache {
    config: CacheConfig,
    entries: Vec<CachedShader>,
    lookup: HashMap<CacheKey, HandleId>,
    names: NameRegistry,
    stats: CacheStats,
}

impl ShaderCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of entries not yet collected.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Claim a session-unique name for a node the caller creates itself,
    /// such as a shape or a light. Shader nodes never take a claimed name.
    pub fn claim_name(&mut self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        self.names.claim(base, taken)
    }

    /// Return a name claimed with [`claim_name`](Self::claim_name).
    pub fn release_name(&mut self, name: &str) {
        self.names.release(name);
    }

    /// Bind `network` for use in `slot`, materializing it on first use.
    ///
    /// On failure every node created for the network is removed again and
    /// nothing is registered.
    pub fn attributes<F: NodeFactory + ?Sized>(
        &mut self,
        factory: &mut F,
        network: &ShaderNetwork,
        slot: &str,
    ) -> Result<ShaderBinding, ShaderError> {
        let scoped = match self.config.scope {
            CacheScope::Global => None,
            CacheScope::PerSlot => Some(slot),
        };
        let key = CacheKey::compute(network, scoped);

        if let Some(&handle) = self.lookup.get(&key) {
            let entry = &mut self.entries[handle.0];
            entry.ref_count += 1;
            self.stats.hits += 1;
            tracing::debug!(%key, slot, refs = entry.ref_count, "shader cache hit");
            return Ok(ShaderBinding { handle });
        }

        self.stats.misses += 1;
        let mut created = Vec::new();
        let output = match self.materialize(factory, network, &key, &mut created) {
            Ok(output) => output,
            Err(err) => {
                for (id, name) in created.into_iter().rev() {
                    if let Err(cleanup) = factory.remove_node(id) {
                        tracing::warn!(name = %name, %cleanup, "failed to remove partially built shader");
                    }
                }
                tracing::debug!(%key, slot, %err, "shader network rejected");
                return Err(err);
            }
        };

        let handle = HandleId(self.entries.len());
        self.stats.nodes_created += created.len() as u64;
        tracing::debug!(%key, slot, nodes = created.len(), "shader cache miss, materialized");
        self.entries.push(CachedShader {
            key,
            slot: slot.to_string(),
            nodes: created,
            output,
            ref_count: 1,
            collected: false,
        });
        self.lookup.insert(key, handle);
        Ok(ShaderBinding { handle })
    }

    /// Take another reference to the entry `binding` points at.
    pub fn share(&mut self, binding: &ShaderBinding) -> ShaderBinding {
        self.entries[binding.handle.0].ref_count += 1;
        ShaderBinding {
            handle: binding.handle,
        }
    }

    /// Give a reference back. Renderer nodes stay until `finalize`.
    pub fn release(&mut self, binding: ShaderBinding) {
        let entry = &mut self.entries[binding.handle.0];
        debug_assert!(entry.ref_count > 0, "binding outlived its reference count");
        entry.ref_count -= 1;
        tracing::trace!(key = %entry.key, refs = entry.ref_count, "shader binding released");
    }

    /// The entry a binding refers to.
    pub fn get(&self, binding: &ShaderBinding) -> &CachedShader {
        &self.entries[binding.handle.0]
    }

    pub fn entry(&self, handle: HandleId) -> Option<&CachedShader> {
        self.entries.get(handle.0)
    }

    /// Live entries in first-creation order.
    pub fn live_handles(&self) -> impl Iterator<Item = (HandleId, &CachedShader)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_live())
            .map(|(i, e)| (HandleId(i), e))
    }

    /// Remove every unreferenced entry from the renderer. Idempotent.
    pub fn finalize<F: NodeFactory + ?Sized>(
        &mut self,
        factory: &mut F,
    ) -> Result<FinalizeReport, ShaderError> {
        let _span = tracing::info_span!("shader_cache_finalize").entered();
        let mut report = FinalizeReport::default();

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.collected || entry.ref_count > 0 {
                continue;
            }
            // Downstream nodes first, mirroring creation order.
            while let Some((id, name)) = entry.nodes.pop() {
                match factory.remove_node(id) {
                    Ok(()) => self.stats.nodes_collected += 1,
                    Err(BackendError::UnknownNode(_)) => {
                        tracing::debug!(name = %name, "shader node already gone");
                    }
                    Err(err) => {
                        entry.nodes.push((id, name));
                        return Err(err.into());
                    }
                }
            }
            entry.collected = true;
            self.lookup.remove(&entry.key);
            self.stats.entries_collected += 1;
            report.collected.push(HandleId(index));
        }

        report.live = self.live_handles().map(|(h, _)| h).collect();
        tracing::info!(
            collected = report.collected.len(),
            live = report.live.len(),
            "shader cache finalized"
        );
        Ok(report)
    }

    fn materialize<F: NodeFactory + ?Sized>(
        &mut self,
        factory: &mut F,
        network: &ShaderNetwork,
        key: &CacheKey,
        created: &mut Vec<(NodeId, String)>,
    ) -> Result<ShaderOutput, ShaderError> {
        let last = network.len() - 1;
        // Backend name per network index, for link rewriting.
        let mut backend_names: Vec<String> = Vec::with_capacity(network.len());

        for (index, shader) in network.shaders().iter().enumerate() {
            let type_name = shader.type_name();
            let kind = factory
                .node_kind(type_name)
                .ok_or_else(|| ShaderError::InvalidShaderType {
                    type_name: type_name.to_string(),
                })?;

            match kind {
                NodeKind::Shader => {}
                NodeKind::Light if index == last => {
                    let mut parameters = Vec::with_capacity(shader.parameters().len());
                    for (name, value) in shader.parameters() {
                        let value = resolve(network, shader, name, value, &backend_names)?;
                        factory.validate_parameter(type_name, name, &value)?;
                        parameters.push((name.clone(), value));
                    }
                    return Ok(ShaderOutput::Light(LightTemplate {
                        type_name: type_name.to_string(),
                        parameters,
                    }));
                }
                _ => {
                    return Err(ShaderError::InvalidShaderType {
                        type_name: type_name.to_string(),
                    });
                }
            }

            let label = match shader.handle() {
                Some(handle) => handle.to_string(),
                None => format!("{type_name}{index}"),
            };
            let base = format!("{}:{}:{}", self.config.name_prefix, key.short(), label);
            let name = self
                .names
                .claim(&base, |candidate| factory.lookup(candidate).is_some());

            let id = match factory.create_node(type_name, &name) {
                Ok(id) => id,
                Err(BackendError::DuplicateName(name)) => {
                    panic!("{}", ShaderError::DuplicateNameCollision(name))
                }
                Err(err) => return Err(err.into()),
            };
            created.push((id, name.clone()));

            for (parameter, value) in shader.parameters() {
                let value = resolve(network, shader, parameter, value, &backend_names)?;
                factory.set_parameter(id, parameter, value)?;
            }
            backend_names.push(name);
        }

        Ok(ShaderOutput::Shader {
            name: backend_names[last].clone(),
        })
    }
}

/// Convert a description value, rewriting links to backend node names.
fn resolve(
    network: &ShaderNetwork,
    shader: &Shader,
    parameter: &str,
    value: &ParameterValue,
    backend_names: &[String],
) -> Result<Value, ShaderError> {
    Ok(match value {
        ParameterValue::Bool(v) => Value::Bool(*v),
        ParameterValue::Int(v) => Value::Int(*v),
        ParameterValue::Float(v) => Value::Float(*v),
        ParameterValue::String(v) => Value::String(v.clone()),
        ParameterValue::Color(c) => Value::Rgb(c.to_array()),
        ParameterValue::Vector(v) => Value::Vector(v.to_array()),
        ParameterValue::Link(handle) => {
            let name = network
                .index_of(handle)
                .and_then(|index| backend_names.get(index))
                .ok_or_else(|| ShaderError::ParameterRejected {
                    shader: shader.type_name().to_string(),
                    parameter: parameter.to_string(),
                    reason: format!("link to {handle:?} does not resolve to an upstream shader"),
                })?;
            Value::Node(name.clone())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepreview_backend::Universe;

    const SURFACE: &str = "ai:surface";
    const LIGHT: &str = "ai:light";

    /// Universe wrapper counting node creations.
    #[derive(Default)]
    struct CountingFactory {
        universe: Universe,
        creates: usize,
    }

    impl NodeFactory for CountingFactory {
        fn node_kind(&self, type_name: &str) -> Option<NodeKind> {
            self.universe.node_kind(type_name)
        }

        fn validate_parameter(&self, type_name: &str, name: &str, value: &Value) -> Result<(), BackendError> {
            self.universe.validate_parameter(type_name, name, value)
        }

        fn create_node(&mut self, type_name: &str, name: &str) -> Result<NodeId, BackendError> {
            self.creates += 1;
            self.universe.create_node(type_name, name)
        }

        fn set_parameter(&mut self, node: NodeId, name: &str, value: Value) -> Result<(), BackendError> {
            self.universe.set_parameter(node, name, value)
        }

        fn remove_node(&mut self, node: NodeId) -> Result<(), BackendError> {
            self.universe.remove_node(node)
        }

        fn lookup(&self, name: &str) -> Option<NodeId> {
            self.universe.lookup(name)
        }
    }

    fn single(type_name: &str) -> ShaderNetwork {
        ShaderNetwork::single(Shader::new(type_name)).unwrap()
    }

    fn linked(consumer: &str, parameter: &str) -> ShaderNetwork {
        ShaderNetwork::new(vec![
            Shader::new("noise").with_parameter("__handle", "myHandle"),
            Shader::new(consumer).with_parameter(parameter, "link:myHandle"),
        ])
        .unwrap()
    }

    #[test]
    fn identical_networks_materialize_once() {
        let mut factory = CountingFactory::default();
        let mut cache = ShaderCache::default();

        let bindings: Vec<ShaderBinding> = (0..10)
            .map(|_| cache.attributes(&mut factory, &single("flat"), SURFACE).unwrap())
            .collect();

        assert_eq!(factory.creates, 1);
        assert!(bindings.iter().all(|b| b.handle() == bindings[0].handle()));
        assert_eq!(cache.get(&bindings[0]).ref_count(), 10);
        assert_eq!(cache.stats().hits, 9);
        assert_eq!(cache.stats().misses, 1);

        for binding in bindings {
            cache.release(binding);
        }
        cache.finalize(&mut factory.universe).unwrap();
        assert_eq!(factory.universe.count(NodeKind::Shader), 0);
    }

    #[test]
    fn structurally_equal_networks_share_entry() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let a = ShaderNetwork::single(
            Shader::new("standard")
                .with_parameter("Kd", 0.8f32)
                .with_parameter("Ks", 0.2f32),
        ).unwrap();
        let b = ShaderNetwork::single(
            Shader::new("standard")
                .with_parameter("Ks", 0.2f32)
                .with_parameter("Kd", 0.8f32),
        ).unwrap();
        let ba = cache.attributes(&mut universe, &a, SURFACE).unwrap();
        let bb = cache.attributes(&mut universe, &b, SURFACE).unwrap();
        assert_eq!(ba.handle(), bb.handle());
        assert_eq!(cache.len(), 1);
        cache.release(ba);
        cache.release(bb);
    }

    #[test]
    fn rebinding_keeps_only_last_shader() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();

        let mut current: Option<ShaderBinding> = None;
        for type_name in ["utility", "flat", "standard"] {
            let next = cache.attributes(&mut universe, &single(type_name), SURFACE).unwrap();
            if let Some(old) = current.replace(next) {
                cache.release(old);
            }
        }
        // Nothing is removed before finalize.
        assert_eq!(universe.count(NodeKind::Shader), 3);

        let report = cache.finalize(&mut universe).unwrap();
        assert_eq!(report.collected.len(), 2);
        assert_eq!(report.live.len(), 1);
        assert_eq!(universe.count(NodeKind::Shader), 1);
        assert_eq!(universe.nodes_of_kind(NodeKind::Shader)[0].type_name, "standard");

        let binding = current.unwrap();
        assert_eq!(report.live, vec![binding.handle()]);
        cache.release(binding);
    }

    #[test]
    fn same_labels_get_unique_names() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();

        let a = cache.attributes(&mut universe, &linked("flat", "color"), SURFACE).unwrap();
        let b = cache
            .attributes(&mut universe, &linked("standard", "Kd_color"), SURFACE)
            .unwrap();
        cache.finalize(&mut universe).unwrap();

        let shaders = universe.nodes_of_kind(NodeKind::Shader);
        assert_eq!(shaders.len(), 4);
        let names: std::collections::HashSet<&str> =
            shaders.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names.len(), 4);

        // Links point at the noise node of the same network.
        let flat = universe.node_by_name(cache.get(&a).output_shader().unwrap()).unwrap();
        let noise_a = cache.get(&a).node_names().next().unwrap().to_string();
        assert_eq!(flat.parameter("color"), Some(&Value::Node(noise_a)));
        let standard = universe.node_by_name(cache.get(&b).output_shader().unwrap()).unwrap();
        assert!(matches!(standard.parameter("Kd_color"), Some(Value::Node(n)) if n.ends_with("myHandle")));

        cache.release(a);
        cache.release(b);
    }

    #[test]
    fn names_avoid_nodes_created_outside_the_cache() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let network = single("flat");
        let key = CacheKey::compute(&network, None);
        let squatter = format!("shader:{}:flat0", key.short());
        universe.create_node("utility", &squatter).unwrap();

        let binding = cache.attributes(&mut universe, &network, SURFACE).unwrap();
        assert_eq!(cache.get(&binding).output_shader(), Some(format!("{squatter}:1").as_str()));
        cache.release(binding);
    }

    #[test]
    fn failed_networks_leave_nothing_behind() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let network = ShaderNetwork::new(vec![
            Shader::new("noise").with_handle("n"),
            Shader::new("flat").with_parameter("not_a_parameter", "link:n"),
        ])
        .unwrap();

        let err = cache.attributes(&mut universe, &network, SURFACE).unwrap_err();
        assert!(matches!(err, ShaderError::ParameterRejected { .. }));
        assert!(err.is_recoverable());
        assert_eq!(universe.count(NodeKind::Shader), 0);
        assert!(cache.is_empty());

        // A retry with a corrected description succeeds.
        let fixed = linked("flat", "color");
        let binding = cache.attributes(&mut universe, &fixed, SURFACE).unwrap();
        assert_eq!(universe.count(NodeKind::Shader), 2);
        cache.release(binding);
    }

    #[test]
    fn unknown_types_are_invalid() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let err = cache
            .attributes(&mut universe, &single("no_such_shader"), SURFACE)
            .unwrap_err();
        assert_eq!(
            err,
            ShaderError::InvalidShaderType {
                type_name: "no_such_shader".into()
            }
        );

        // Shapes are not shaders either.
        let err = cache
            .attributes(&mut universe, &single("polymesh"), SURFACE)
            .unwrap_err();
        assert!(matches!(err, ShaderError::InvalidShaderType { .. }));
    }

    #[test]
    fn light_outputs_become_templates() {
        let mut factory = CountingFactory::default();
        let mut cache = ShaderCache::default();
        let network = ShaderNetwork::single(
            Shader::new("point_light").with_parameter("intensity", 4.0f32),
        ).unwrap();

        let first = cache.attributes(&mut factory, &network, LIGHT).unwrap();
        let second = cache.share(&first);
        assert_eq!(factory.creates, 0);
        assert_eq!(cache.get(&first).node_count(), 0);
        assert_eq!(cache.get(&second).ref_count(), 2);

        let template = cache.get(&first).light_template().unwrap();
        assert_eq!(template.type_name, "point_light");
        assert_eq!(
            template.parameters,
            vec![("intensity".to_string(), Value::Float(4.0))]
        );
        cache.release(first);
        cache.release(second);
    }

    #[test]
    fn light_template_parameters_are_validated() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let network = ShaderNetwork::new(vec![
            Shader::new("image").with_handle("tex"),
            Shader::new("point_light").with_parameter("shade_mode", "link:tex"),
        ])
        .unwrap();
        let err = cache.attributes(&mut universe, &network, LIGHT).unwrap_err();
        assert!(matches!(err, ShaderError::ParameterRejected { .. }));
        assert_eq!(universe.count(NodeKind::Shader), 0);
    }

    #[test]
    fn zero_count_entries_revive_before_finalize() {
        let mut factory = CountingFactory::default();
        let mut cache = ShaderCache::default();

        let binding = cache.attributes(&mut factory, &single("flat"), SURFACE).unwrap();
        cache.release(binding);
        let binding = cache.attributes(&mut factory, &single("flat"), SURFACE).unwrap();
        assert_eq!(factory.creates, 1);

        let report = cache.finalize(&mut factory).unwrap();
        assert!(report.collected.is_empty());
        assert_eq!(factory.universe.count(NodeKind::Shader), 1);
        cache.release(binding);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let keep = cache.attributes(&mut universe, &single("flat"), SURFACE).unwrap();
        let drop = cache.attributes(&mut universe, &single("utility"), SURFACE).unwrap();
        cache.release(drop);

        let first = cache.finalize(&mut universe).unwrap();
        let second = cache.finalize(&mut universe).unwrap();
        assert_eq!(first.collected.len(), 1);
        assert!(second.collected.is_empty());
        assert_eq!(first.live, second.live);
        assert_eq!(universe.count(NodeKind::Shader), 1);
        assert_eq!(cache.stats().entries_collected, 1);
        cache.release(keep);
    }

    #[test]
    fn collected_keys_rematerialize_after_finalize() {
        let mut factory = CountingFactory::default();
        let mut cache = ShaderCache::default();
        let binding = cache.attributes(&mut factory, &single("flat"), SURFACE).unwrap();
        cache.release(binding);
        cache.finalize(&mut factory).unwrap();

        let binding = cache.attributes(&mut factory, &single("flat"), SURFACE).unwrap();
        assert_eq!(factory.creates, 2);
        let name = cache.get(&binding).output_shader().unwrap().to_string();
        // The first name is never reused within the session.
        assert!(name.ends_with(":1"));
        cache.release(binding);
    }

    #[test]
    fn live_handles_in_creation_order() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let a = cache.attributes(&mut universe, &single("standard"), SURFACE).unwrap();
        let b = cache.attributes(&mut universe, &single("flat"), SURFACE).unwrap();
        let c = cache.attributes(&mut universe, &single("utility"), SURFACE).unwrap();
        cache.release(b);

        let live: Vec<HandleId> = cache.live_handles().map(|(h, _)| h).collect();
        assert_eq!(live, vec![a.handle(), c.handle()]);
        cache.release(a);
        cache.release(c);
    }

    #[test]
    fn per_slot_scope_separates_entries() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::new(CacheConfig {
            scope: CacheScope::PerSlot,
            ..CacheConfig::default()
        });
        let a = cache.attributes(&mut universe, &single("flat"), SURFACE).unwrap();
        let b = cache.attributes(&mut universe, &single("flat"), "ai:displacement").unwrap();
        assert_ne!(a.handle(), b.handle());
        assert_eq!(cache.get(&b).slot(), "ai:displacement");
        assert_eq!(universe.count(NodeKind::Shader), 2);
        cache.release(a);
        cache.release(b);
    }

    #[test]
    fn global_scope_shares_across_slots() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let a = cache.attributes(&mut universe, &single("flat"), SURFACE).unwrap();
        let b = cache.attributes(&mut universe, &single("flat"), "ai:displacement").unwrap();
        assert_eq!(a.handle(), b.handle());
        cache.release(a);
        cache.release(b);
    }

    #[test]
    fn config_prefix_names_nodes() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::new(CacheConfig {
            name_prefix: "look".into(),
            ..CacheConfig::default()
        });
        let binding = cache.attributes(&mut universe, &single("flat"), SURFACE).unwrap();
        assert!(cache.get(&binding).output_shader().unwrap().starts_with("look:"));
        cache.release(binding);
    }

    #[test]
    fn caller_claimed_names_are_avoided() {
        let mut universe = Universe::default();
        let mut cache = ShaderCache::default();
        let network = single("flat");
        let base = format!("shader:{}:flat0", CacheKey::compute(&network, None).short());
        let pending = cache.claim_name(&base, |_| false);
        assert_eq!(pending, base);

        let binding = cache.attributes(&mut universe, &network, SURFACE).unwrap();
        let shader = cache.get(&binding).output_shader().unwrap().to_string();
        assert_ne!(shader, pending);
        assert!(universe.lookup(&pending).is_none());
        cache.release(binding);
    }

    #[test]
    fn duplicate_name_errors_are_fatal() {
        let err = ShaderError::from(BackendError::DuplicateName("x".into()));
        assert_eq!(err, ShaderError::DuplicateNameCollision("x".into()));
        assert!(!err.is_recoverable());
    }
}
