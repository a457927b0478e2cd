use crate::registry::{NodeKind, NodeRegistry, ParamType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name of the options node every universe carries.
pub const OPTIONS_NODE: &str = "options";

/// Identifier of a node inside one universe. Ids grow with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// A parameter value as stored on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Rgb([f32; 3]),
    Vector([f32; 3]),
    Matrix([f32; 16]),
    /// Connection to the node with this name.
    Node(String),
    IntArray(Vec<i32>),
    PointArray(Vec<[f32; 3]>),
}

impl Value {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::String(_) => ParamType::String,
            Self::Rgb(_) => ParamType::Rgb,
            Self::Vector(_) => ParamType::Vector,
            Self::Matrix(_) => ParamType::Matrix,
            Self::Node(_) => ParamType::Node,
            Self::IntArray(_) => ParamType::IntArray,
            Self::PointArray(_) => ParamType::PointArray,
        }
    }

    pub fn as_node(&self) -> Option<&str> {
        match self {
            Self::Node(name) => Some(name),
            _ => None,
        }
    }
}

/// Errors reported by the renderer universe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown node type {0:?}")]
    UnknownNodeType(String),
    #[error("a node named {0:?} already exists")]
    DuplicateName(String),
    #[error("node {node:?} rejected parameter {parameter:?}: {reason}")]
    ParameterRejected {
        node: String,
        parameter: String,
        reason: String,
    },
    #[error("node {0:?} not found")]
    UnknownNode(NodeId),
    #[error("node {0:?} cannot be removed")]
    Protected(String),
}

/// Node construction interface the adapter layers program against.
pub trait NodeFactory {
    /// Kind of a node type, or `None` if the type is unknown.
    fn node_kind(&self, type_name: &str) -> Option<NodeKind>;

    /// Check a parameter value against a node type without creating anything.
    fn validate_parameter(&self, type_name: &str, name: &str, value: &Value) -> Result<(), BackendError>;

    /// Create a node of `type_name` called `name`.
    fn create_node(&mut self, type_name: &str, name: &str) -> Result<NodeId, BackendError>;

    /// Set one parameter on an existing node.
    fn set_parameter(&mut self, node: NodeId, name: &str, value: Value) -> Result<(), BackendError>;

    /// Remove a node. Links other nodes hold to it are cleared.
    fn remove_node(&mut self, node: NodeId) -> Result<(), BackendError>;

    /// Find a node by name.
    fn lookup(&self, name: &str) -> Option<NodeId>;
}

/// A node in the universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub type_name: String,
    pub kind: NodeKind,
    pub parameters: BTreeMap<String, Value>,
}

impl Node {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// In-memory renderer scene graph.
///
/// Uses BTreeMap keyed by monotonically increasing ids so iteration follows
/// creation order.
#[derive(Debug, Clone)]
pub struct Universe {
    registry: NodeRegistry,
    nodes: BTreeMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    next_id: u64,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new(NodeRegistry::builtin())
    }
}

impl Universe {
    /// Create a universe holding only the options node.
    pub fn new(registry: NodeRegistry) -> Self {
        let mut universe = Self {
            registry,
            nodes: BTreeMap::new(),
            names: HashMap::new(),
            next_id: 0,
        };
        universe.insert_node(OPTIONS_NODE, OPTIONS_NODE, NodeKind::Options);
        universe
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Id of the options node.
    pub fn options(&self) -> NodeId {
        self.names[OPTIONS_NODE]
    }

    /// Number of nodes, including the options node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Nodes of one kind in creation order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.kind == kind).collect()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    /// Unset a parameter so the node falls back to the type default.
    pub fn clear_parameter(&mut self, node: NodeId, name: &str) -> Result<Option<Value>, BackendError> {
        let target = self.nodes.get_mut(&node).ok_or(BackendError::UnknownNode(node))?;
        Ok(target.parameters.remove(name))
    }

    fn insert_node(&mut self, type_name: &str, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                type_name: type_name.to_string(),
                kind,
                parameters: BTreeMap::new(),
            },
        );
        self.names.insert(name.to_string(), id);
        id
    }

    fn check_parameter(&self, type_name: &str, name: &str, value: &Value) -> Result<(), String> {
        let node_type = self
            .registry
            .get(type_name)
            .ok_or_else(|| format!("type {type_name:?} is not registered"))?;
        let expected = node_type
            .parameter(name)
            .ok_or_else(|| format!("{type_name} has no such parameter"))?;

        if let Value::Node(target) = value {
            if !expected.linkable() {
                return Err(format!("{expected:?} parameters cannot be linked"));
            }
            if !self.names.contains_key(target) {
                return Err(format!("link target {target:?} does not exist"));
            }
            return Ok(());
        }

        if value.param_type() != expected {
            return Err(format!(
                "expected {expected:?}, got {:?}",
                value.param_type()
            ));
        }
        Ok(())
    }
}

impl NodeFactory for Universe {
    fn node_kind(&self, type_name: &str) -> Option<NodeKind> {
        self.registry.get(type_name).map(|t| t.kind)
    }

    fn validate_parameter(&self, type_name: &str, name: &str, value: &Value) -> Result<(), BackendError> {
        self.check_parameter(type_name, name, value)
            .map_err(|reason| BackendError::ParameterRejected {
                node: type_name.to_string(),
                parameter: name.to_string(),
                reason,
            })
    }

    fn create_node(&mut self, type_name: &str, name: &str) -> Result<NodeId, BackendError> {
        let kind = self
            .node_kind(type_name)
            .ok_or_else(|| BackendError::UnknownNodeType(type_name.to_string()))?;
        if self.names.contains_key(name) {
            return Err(BackendError::DuplicateName(name.to_string()));
        }
        let id = self.insert_node(type_name, name, kind);
        tracing::trace!(name, type_name, ?id, "node created");
        Ok(id)
    }

    fn set_parameter(&mut self, node: NodeId, name: &str, value: Value) -> Result<(), BackendError> {
        let target = self.nodes.get(&node).ok_or(BackendError::UnknownNode(node))?;
        self.check_parameter(&target.type_name, name, &value)
            .map_err(|reason| BackendError::ParameterRejected {
                node: target.name.clone(),
                parameter: name.to_string(),
                reason,
            })?;
        if let Some(target) = self.nodes.get_mut(&node) {
            target.parameters.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), BackendError> {
        let name = match self.nodes.get(&node) {
            Some(n) if n.kind == NodeKind::Options => {
                return Err(BackendError::Protected(n.name.clone()));
            }
            Some(n) => n.name.clone(),
            None => return Err(BackendError::UnknownNode(node)),
        };
        self.nodes.remove(&node);
        self.names.remove(&name);

        for other in self.nodes.values_mut() {
            other
                .parameters
                .retain(|_, value| value.as_node() != Some(name.as_str()));
        }
        tracing::trace!(name = %name, ?node, "node removed");
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }
}
