use scenepreview_common::{ParameterValue, ShaderNetwork};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash of a canonicalized shader network.
///
/// Parameters are hashed in sorted name order and links by the index of the
/// shader they point at, so neither parameter insertion order nor the local
/// handle labels affect the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(pub [u8; 32]);

impl CacheKey {
    /// Key a network, optionally scoped to an attribute slot.
    pub fn compute(network: &ShaderNetwork, slot: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        match slot {
            Some(slot) => {
                hasher.update([1u8]);
                put_str(&mut hasher, slot);
            }
            None => hasher.update([0u8]),
        }

        put_len(&mut hasher, network.len());
        for shader in network.shaders() {
            put_str(&mut hasher, shader.type_name());
            put_len(&mut hasher, shader.parameters().len());
            for (name, value) in shader.parameters() {
                put_str(&mut hasher, name);
                put_value(&mut hasher, network, value);
            }
        }

        Self(hasher.finalize().into())
    }

    /// First 8 bytes as hex, used to prefix backend node names.
    pub fn short(&self) -> String {
        hex(&self.0[..8])
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn put_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn put_str(hasher: &mut Sha256, s: &str) {
    put_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn put_f32(hasher: &mut Sha256, v: f32) {
    // -0.0 and 0.0 render identically.
    let v = if v == 0.0 { 0.0f32 } else { v };
    hasher.update(v.to_le_bytes());
}

fn put_value(hasher: &mut Sha256, network: &ShaderNetwork, value: &ParameterValue) {
    match value {
        ParameterValue::Bool(v) => {
            hasher.update([0u8]);
            hasher.update([*v as u8]);
        }
        ParameterValue::Int(v) => {
            hasher.update([1u8]);
            hasher.update(v.to_le_bytes());
        }
        ParameterValue::Float(v) => {
            hasher.update([2u8]);
            put_f32(hasher, *v);
        }
        ParameterValue::String(v) => {
            hasher.update([3u8]);
            put_str(hasher, v);
        }
        ParameterValue::Color(c) => {
            hasher.update([4u8]);
            for v in c.to_array() {
                put_f32(hasher, v);
            }
        }
        ParameterValue::Vector(c) => {
            hasher.update([5u8]);
            for v in c.to_array() {
                put_f32(hasher, v);
            }
        }
        ParameterValue::Link(handle) => {
            hasher.update([6u8]);
            // Validated networks always resolve; the fallback keeps the
            // label so distinct dangling links still hash apart.
            match network.index_of(handle) {
                Some(index) => put_len(hasher, index),
                None => put_str(hasher, handle),
            }
        }
    }
}
