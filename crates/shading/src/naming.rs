use std::collections::HashSet;

/// Session-scoped allocator of unique backend node names.
///
/// A requested base name is handed out as-is the first time; later requests
/// (or bases already taken in the backend) get a `:<n>` suffix.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    claimed: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a name derived from `base`. `taken` reports names already in use
    /// outside this registry.
    pub fn claim(&mut self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 0u32;
        while self.claimed.contains(&candidate) || taken(&candidate) {
            suffix += 1;
            candidate = format!("{base}:{suffix}");
        }
        self.claimed.insert(candidate.clone());
        candidate
    }

    /// Give a name back so a later claim for the same base can reuse it.
    pub fn release(&mut self, name: &str) -> bool {
        self.claimed.remove(name)
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Number of names handed out this session.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
