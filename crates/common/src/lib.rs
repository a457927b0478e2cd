//! Shared types for the scenepreview workspace.
//!
//! # Invariants
//! - A `ShaderNetwork` is validated once, at construction, and never mutated.
//! - Links always point at an earlier node of the same network.

pub mod network;
pub mod types;

pub use network::{NetworkError, Shader, ShaderNetwork};
pub use types::{ParameterValue, SessionId};

pub fn crate_info() -> &'static str {
    "scenepreview-common v0.1.0"
}
