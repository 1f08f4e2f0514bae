//! In-memory view of the registry at one version.

use std::collections::BTreeMap;

use uuid::Uuid;

use canonize_core::{normalize_identity, EntityRegistryEntry};

/// The whole registry as loaded from storage. `version` increments by one
/// on every successful persist and anchors optimistic concurrency.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub version: i64,
    pub entries: BTreeMap<Uuid, EntityRegistryEntry>,
}

impl RegistrySnapshot {
    /// Normalized name (canonical plus every variant) to entity id.
    pub fn identity_index(&self) -> BTreeMap<String, Uuid> {
        let mut index = BTreeMap::new();
        for (id, entry) in &self.entries {
            let key = normalize_identity(&entry.organization_name);
            if !key.is_empty() {
                index.insert(key, *id);
            }
            for variant in &entry.name_variants {
                let key = normalize_identity(variant);
                if !key.is_empty() {
                    index.insert(key, *id);
                }
            }
        }
        index
    }
}
