//! Shader cache: content-addressed deduplication of shader networks.
//!
//! Networks are keyed by a SHA-256 of their canonical form. Each distinct key
//! is materialized in the renderer once; bindings count references, and
//! unreferenced entries are removed from the renderer at finalize.
//!
//! # Invariants
//! - A key maps to at most one cached entry.
//! - Backend node names chosen by the cache are unique within a session.
//! - Nothing is removed from the renderer before `finalize`.

pub mod cache;
pub mod key;
pub mod naming;

pub use cache::{
    CacheConfig, CacheScope, CacheStats, CachedShader, FinalizeReport, HandleId, LightTemplate,
    ShaderBinding, ShaderCache, ShaderError, ShaderOutput,
};
pub use key::CacheKey;
pub use naming::NameRegistry;

pub fn crate_info() -> &'static str {
    "scenepreview-shading v0.1.0"
}
