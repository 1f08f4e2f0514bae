//! Aggregator — merges each entity group into one canonical record with
//! per-field provenance and a conflict log.

use std::collections::{BTreeMap, BTreeSet};

use canonize_core::{
    CanonicalRecord, ConflictLogEntry, RawRecord, RejectedValue, DECLARED_FIELDS,
};

use crate::progress::{notify, ProgressListener};
use crate::select::{select_field, FieldCandidate};

/// A declared-field value that failed its kind check and was coerced to
/// null during sanitization. Logged as a rejected conflict value.
#[derive(Debug, Clone)]
pub struct MalformedValue {
    pub record_index: usize,
    pub field: String,
    pub value: String,
    pub source_dataset: String,
}

/// Merge records into canonical records, one per cluster key.
///
/// `cluster_keys[i]` is the entity group of `records[i]`; the two slices are
/// parallel. Groups are processed in key order and candidates within a group
/// in record order, so output is deterministic for a fixed input sequence.
///
/// Conservation holds by construction: every record index lands in exactly
/// one group, so the union of `source_record_ids` over the output equals the
/// input id set.
pub fn aggregate(
    records: &[RawRecord],
    cluster_keys: &[String],
    malformed: &[MalformedValue],
    listener: Option<&dyn ProgressListener>,
) -> (Vec<CanonicalRecord>, Vec<ConflictLogEntry>) {
    debug_assert_eq!(records.len(), cluster_keys.len());

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, key) in cluster_keys.iter().enumerate() {
        groups.entry(key.as_str()).or_default().push(index);
    }

    let total = groups.len();
    if let Some(l) = listener {
        notify("on_started", || l.on_started(total));
    }

    let mut canonical = Vec::with_capacity(total);
    let mut conflicts = Vec::new();

    for (position, (group_key, members)) in groups.iter().enumerate() {
        let record = merge_group(group_key, members, records, malformed, &mut conflicts);
        canonical.push(record);

        if let Some(l) = listener {
            notify("on_group", || l.on_group(group_key, position, total));
        }
    }

    if let Some(l) = listener {
        notify("on_completed", || l.on_completed(canonical.len()));
    }

    (canonical, conflicts)
}

fn merge_group(
    group_key: &str,
    members: &[usize],
    records: &[RawRecord],
    malformed: &[MalformedValue],
    conflicts: &mut Vec<ConflictLogEntry>,
) -> CanonicalRecord {
    let mut fields = BTreeMap::new();
    let mut provenance = BTreeMap::new();
    let mut source_datasets = BTreeSet::new();
    let mut source_record_ids = BTreeSet::new();

    for &index in members {
        let r = &records[index];
        source_datasets.insert(r.source_dataset.clone());
        source_record_ids.insert(r.qualified_id());
    }

    for (field, _) in DECLARED_FIELDS {
        let candidates: Vec<FieldCandidate> = members
            .iter()
            .map(|&index| {
                let r = &records[index];
                FieldCandidate {
                    value: r.field(field).map(String::from),
                    source_dataset: r.source_dataset.clone(),
                    source_record_id: r.source_record_id.clone(),
                    source_priority: r.source_priority,
                    quality_score: r.quality_score,
                    observed_at: r.observed_at,
                    first_seen: index,
                }
            })
            .collect();

        let selection = select_field(&candidates);

        let mut rejected: Vec<RejectedValue> = Vec::new();
        let mut winning_source = None;
        if let Some(ref s) = selection {
            rejected.extend(s.rejected.iter().cloned());
            winning_source = Some(s.provenance.source_dataset.clone());
        }

        // Coerced malformed values for this group/field join the rejects.
        for m in malformed {
            if m.field == *field && members.contains(&m.record_index) {
                rejected.push(RejectedValue {
                    value: m.value.clone(),
                    source_dataset: m.source_dataset.clone(),
                });
            }
        }

        if !rejected.is_empty() {
            conflicts.push(ConflictLogEntry {
                field: (*field).to_string(),
                group_key: group_key.to_string(),
                winning_source,
                rejected_values: rejected,
            });
        }

        if let Some(s) = selection {
            fields.insert((*field).to_string(), s.value);
            provenance.insert((*field).to_string(), s.provenance);
        }
    }

    let completeness = fields.len() as f64 / DECLARED_FIELDS.len() as f64;

    CanonicalRecord {
        group_key: group_key.to_string(),
        fields,
        provenance,
        source_datasets,
        source_record_ids,
        completeness,
    }
}
