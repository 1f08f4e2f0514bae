//! `canonize-registry` — durable entity identities across pipeline runs.
//!
//! The registry is the system of record for entity ids: once minted, an id
//! is never reused, entities are never deleted, and status history only
//! grows. Concurrent writers are handled optimistically with a version
//! stamp and bounded retries.

pub mod error;
pub mod merge;
pub mod snapshot;
pub mod store;

pub use error::RegistryError;
pub use merge::merge_snapshot;
pub use snapshot::RegistrySnapshot;
pub use store::RegistryStore;

use chrono::{DateTime, Utc};

use canonize_core::CanonicalRecord;

/// Merge one run's canonical records into the registry and persist.
///
/// Load, merge and compare-and-swap persist, retried up to `max_retries`
/// times when another writer advances the version in between. Invariant
/// violations are returned immediately and never retried.
pub fn sync(
    store: &mut RegistryStore,
    canonical: &[CanonicalRecord],
    run_at: DateTime<Utc>,
    max_retries: u32,
) -> Result<RegistrySnapshot, RegistryError> {
    let attempts = max_retries.max(1);

    for attempt in 1..=attempts {
        let snapshot = store.load()?;
        let mut merged = merge_snapshot(&snapshot, canonical, run_at)?;

        match store.persist(snapshot.version, &merged) {
            Ok(version) => {
                merged.version = version;
                return Ok(merged);
            }
            Err(RegistryError::VersionMismatch { expected, found }) => {
                log::warn!(
                    "registry sync attempt {attempt}/{attempts}: version moved {expected} -> {found}, retrying"
                );
            }
            Err(other) => return Err(other),
        }
    }

    Err(RegistryError::Conflict { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    fn canonical(name: &str, status: Option<&str>) -> CanonicalRecord {
        let mut fields = BTreeMap::new();
        fields.insert("organization_name".to_string(), name.to_string());
        if let Some(s) = status {
            fields.insert("status".to_string(), s.to_string());
        }
        CanonicalRecord {
            group_key: name.to_lowercase(),
            fields,
            provenance: BTreeMap::new(),
            source_datasets: BTreeSet::new(),
            source_record_ids: BTreeSet::new(),
            completeness: 0.0,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn sync_mints_persists_and_bumps_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");
        let mut store = RegistryStore::open(&path).unwrap();

        let snapshot = sync(
            &mut store,
            &[canonical("Aero School", Some("active"))],
            at(1),
            3,
        )
        .unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.entries.len(), 1);

        let reloaded = RegistryStore::open(&path).unwrap().load().unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(reloaded.entries.len(), 1);
    }

    #[test]
    fn identity_survives_across_syncs() {
        let dir = TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("registry.db")).unwrap();

        let first = sync(&mut store, &[canonical("Aero School", Some("active"))], at(1), 3).unwrap();
        let id = *first.entries.keys().next().unwrap();

        let second =
            sync(&mut store, &[canonical("AERO SCHOOL", Some("dormant"))], at(2), 3).unwrap();
        assert_eq!(second.entries.len(), 1);
        let entry = &second.entries[&id];
        assert_eq!(entry.current_status(), Some("dormant"));
        assert_eq!(entry.status_history.len(), 2);
    }

    #[test]
    fn concurrent_writer_triggers_retry_then_success() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");

        let mut ours = RegistryStore::open(&path).unwrap();
        let mut theirs = RegistryStore::open(&path).unwrap();

        // Simulate the interleaving by advancing the version underneath a
        // stale snapshot, then confirm sync recovers by reloading.
        let stale = ours.load().unwrap();
        sync(&mut theirs, &[canonical("Zebra Mining", None)], at(1), 3).unwrap();

        let merged = merge_snapshot(&stale, &[canonical("Aero School", None)], at(1)).unwrap();
        assert!(matches!(
            ours.persist(stale.version, &merged),
            Err(RegistryError::VersionMismatch { .. })
        ));

        let snapshot = sync(&mut ours, &[canonical("Aero School", None)], at(1), 3).unwrap();
        assert_eq!(snapshot.entries.len(), 2);
    }
}
