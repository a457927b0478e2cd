use scenepreview_common::ShaderNetwork;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute holding the surface shader network.
pub const SURFACE_ATTRIBUTE: &str = "ai:surface";
/// Attribute holding the light shader network.
pub const LIGHT_ATTRIBUTE: &str = "ai:light";
/// Shape flag attributes forwarded to the renderer.
pub const MATTE_ATTRIBUTE: &str = "ai:matte";
pub const OPAQUE_ATTRIBUTE: &str = "ai:opaque";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Shader(ShaderNetwork),
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

impl From<ShaderNetwork> for AttributeValue {
    fn from(v: ShaderNetwork) -> Self {
        Self::Shader(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Named attributes describing how objects are shaded and treated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn shader(&self, name: &str) -> Option<&ShaderNetwork> {
        match self.values.get(name) {
            Some(AttributeValue::Shader(network)) => Some(network),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(AttributeValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
