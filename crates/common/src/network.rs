//! Shader network descriptions.
//!
//! A network is an ordered list of shaders. The last shader is the output;
//! every other shader feeds it (directly or indirectly) through links.

use crate::types::ParameterValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Parameter name that carries a shader's handle label.
pub const HANDLE_PARAMETER: &str = "__handle";

/// Errors from network construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("shader network has no shaders")]
    Empty,
    #[error("handle {0:?} is used by more than one shader")]
    DuplicateHandle(String),
    #[error("parameter {parameter:?} of shader {shader} links to unknown handle {handle:?}")]
    UnresolvedLink {
        shader: usize,
        parameter: String,
        handle: String,
    },
}

/// One node of a shader network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shader {
    type_name: String,
    handle: Option<String>,
    parameters: BTreeMap<String, ParameterValue>,
}

impl Shader {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            handle: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Label other shaders in the network use to link to this one.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Set a parameter. `__handle` sets the handle label instead.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == HANDLE_PARAMETER {
            if let ParameterValue::String(handle) = value {
                self.handle = Some(handle);
                return self;
            }
        }
        self.parameters.insert(name, value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Parameters in sorted name order.
    pub fn parameters(&self) -> &BTreeMap<String, ParameterValue> {
        &self.parameters
    }
}

/// An immutable, validated shader network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Shader>", into = "Vec<Shader>")]
pub struct ShaderNetwork {
    shaders: Vec<Shader>,
    /// Handle label -> index in `shaders`.
    handles: HashMap<String, usize>,
}

impl ShaderNetwork {
    /// Validate and build a network. The last shader is the output.
    pub fn new(shaders: Vec<Shader>) -> Result<Self, NetworkError> {
        if shaders.is_empty() {
            return Err(NetworkError::Empty);
        }

        let mut handles = HashMap::new();
        for (index, shader) in shaders.iter().enumerate() {
            for (parameter, value) in &shader.parameters {
                if let Some(target) = value.link_target() {
                    // Only upstream shaders can be linked to.
                    if !handles.contains_key(target) {
                        return Err(NetworkError::UnresolvedLink {
                            shader: index,
                            parameter: parameter.clone(),
                            handle: target.to_string(),
                        });
                    }
                }
            }
            if let Some(handle) = &shader.handle {
                if handles.insert(handle.clone(), index).is_some() {
                    return Err(NetworkError::DuplicateHandle(handle.clone()));
                }
            }
        }

        Ok(Self { shaders, handles })
    }

    /// A network holding a single shader. Fails if the shader links anywhere,
    /// since there is nothing upstream to link to.
    pub fn single(shader: Shader) -> Result<Self, NetworkError> {
        Self::new(vec![shader])
    }

    pub fn shaders(&self) -> &[Shader] {
        &self.shaders
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// The output shader.
    pub fn output(&self) -> &Shader {
        &self.shaders[self.shaders.len() - 1]
    }

    /// Index of the shader carrying `handle`.
    pub fn index_of(&self, handle: &str) -> Option<usize> {
        self.handles.get(handle).copied()
    }
}

impl TryFrom<Vec<Shader>> for ShaderNetwork {
    type Error = NetworkError;

    fn try_from(shaders: Vec<Shader>) -> Result<Self, Self::Error> {
        Self::new(shaders)
    }
}

impl From<ShaderNetwork> for Vec<Shader> {
    fn from(network: ShaderNetwork) -> Self {
        network.shaders
    }
}
