use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one render session.
///
/// Stamped into every scene description written by that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefix marking a string parameter as a connection to another shader.
pub const LINK_PREFIX: &str = "link:";

/// A shader parameter value as described by the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Color(Vec3),
    Vector(Vec3),
    /// Output of the shader carrying this handle label.
    Link(String),
}

impl ParameterValue {
    /// Build a link to the shader with the given handle label.
    pub fn link(handle: impl Into<String>) -> Self {
        Self::Link(handle.into())
    }

    /// Build an rgb color.
    pub fn color(r: f32, g: f32, b: f32) -> Self {
        Self::Color(Vec3::new(r, g, b))
    }

    /// The handle label this value links to, if it is a link.
    pub fn link_target(&self) -> Option<&str> {
        match self {
            Self::Link(handle) => Some(handle),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Color(_) => "color",
            Self::Vector(_) => "vector",
            Self::Link(_) => "link",
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

/// Strings of the form `link:<handle>` become links.
impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        match v.strip_prefix(LINK_PREFIX) {
            Some(handle) => Self::Link(handle.to_string()),
            None => Self::String(v.to_string()),
        }
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::from(v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_uniqueness() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn link_strings_become_links() {
        assert_eq!(
            ParameterValue::from("link:myHandle"),
            ParameterValue::link("myHandle")
        );
        assert_eq!(
            ParameterValue::from(String::from("plain")),
            ParameterValue::String("plain".into())
        );
    }

    #[test]
    fn link_target_only_for_links() {
        assert_eq!(ParameterValue::link("n").link_target(), Some("n"));
        assert_eq!(ParameterValue::Float(1.0).link_target(), None);
        assert_eq!(ParameterValue::color(1.0, 0.0, 0.0).type_name(), "color");
    }
}
