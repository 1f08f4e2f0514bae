//! Pure merge of one run's canonical records into a registry snapshot.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use canonize_core::{normalize_identity, CanonicalRecord, EntityRegistryEntry, StatusEntry};

use crate::error::RegistryError;
use crate::snapshot::RegistrySnapshot;

/// Merge canonical records into the snapshot, preserving identity
/// continuity.
///
/// A canonical record whose normalized name (or any known variant) matches
/// an existing entity keeps that entity's id; otherwise a fresh id is
/// minted. Status changes append exactly one history entry per run, never
/// consecutive duplicates. Existing entities are never removed and their
/// histories are never rewritten, so the result always extends the input.
pub fn merge_snapshot(
    snapshot: &RegistrySnapshot,
    canonical: &[CanonicalRecord],
    run_at: DateTime<Utc>,
) -> Result<RegistrySnapshot, RegistryError> {
    let mut next = snapshot.clone();
    let mut index = next.identity_index();

    for record in canonical {
        let Some(name) = record.fields.get("organization_name") else {
            log::debug!(
                "canonical record '{}' has no organization name; not registered",
                record.group_key
            );
            continue;
        };
        let norm = normalize_identity(name);
        if norm.is_empty() {
            continue;
        }

        let status = record.fields.get("status").map(String::as_str);

        match index.get(&norm).copied() {
            Some(entity_id) => {
                let entry = next.entries.get_mut(&entity_id).ok_or_else(|| {
                    RegistryError::Invariant(format!(
                        "identity index points at unknown entity {entity_id}"
                    ))
                })?;

                if entry.organization_name != *name {
                    entry.name_variants.insert(name.clone());
                }
                apply_status(entry, status, run_at);
            }
            None => {
                let entity_id = Uuid::new_v4();
                if next.entries.contains_key(&entity_id) {
                    return Err(RegistryError::Invariant(format!(
                        "minted entity id {entity_id} already exists"
                    )));
                }

                let mut entry = EntityRegistryEntry {
                    entity_id,
                    organization_name: name.clone(),
                    name_variants: Default::default(),
                    status_history: Vec::new(),
                };
                apply_status(&mut entry, status, run_at);

                index.insert(norm, entity_id);
                next.entries.insert(entity_id, entry);
            }
        }
    }

    Ok(next)
}

fn apply_status(entry: &mut EntityRegistryEntry, status: Option<&str>, run_at: DateTime<Utc>) {
    let Some(status) = status else { return };
    if entry.current_status() == Some(status) {
        return;
    }
    entry.status_history.push(StatusEntry {
        status: status.to_string(),
        changed_at: run_at,
    });
}
