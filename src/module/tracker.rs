//! Case-insensitive identity tracking for de-duplication.

use std::collections::HashSet;

/// A case-insensitive set of module identities.
///
/// Scoped to one emission or closure-assembly operation. Identities are compared on their
/// lowercase form, so `"Foo"` and `"FOO"` collide.
#[derive(Debug, Default, Clone)]
pub struct IdentityTracker {
    names: HashSet<String>,
}

impl IdentityTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity`. Returns `false` if it was already present.
    pub fn insert(&mut self, identity: &str) -> bool {
        self.names.insert(identity.to_lowercase())
    }

    /// True if `identity` has been registered
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.names.contains(&identity.to_lowercase())
    }

    /// Number of distinct identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
