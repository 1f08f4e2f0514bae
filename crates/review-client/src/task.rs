//! Review task construction.
//!
//! A task carries the pair plus enough field-level evidence for a human to
//! adjudicate without access to the raw datasets. Task keys are stable
//! hashes of the pair ids, so resubmitting the same pair is idempotent on
//! the server side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use canonize_core::{Classification, MatchPair, RawRecord, DECLARED_FIELDS};

/// Side-by-side values for one declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEvidence {
    pub field: String,
    pub value_a: Option<String>,
    pub value_b: Option<String>,
}

/// One pair awaiting human adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTask {
    pub task_key: String,
    pub record_a_id: String,
    pub record_b_id: String,
    pub match_probability: f64,
    /// The engine's own classification of the pair, shown to the reviewer
    /// as the proposed outcome.
    pub proposed: Classification,
    pub evidence: Vec<FieldEvidence>,
}

/// Stable key for a pair. Ids are joined in sorted order so the key does
/// not depend on which side of the pair a record landed on.
pub fn task_key(record_a_id: &str, record_b_id: &str) -> String {
    let (lo, hi) = if record_a_id <= record_b_id {
        (record_a_id, record_b_id)
    } else {
        (record_b_id, record_a_id)
    };
    blake3::hash(format!("{lo}|{hi}").as_bytes()).to_hex()[..32].to_string()
}

/// Build a review task from a scored pair, pulling field evidence from the
/// records by qualified id. Fields empty on both sides are omitted.
pub fn build_task(pair: &MatchPair, records: &BTreeMap<String, &RawRecord>) -> ReviewTask {
    let a = records.get(&pair.record_a_id).copied();
    let b = records.get(&pair.record_b_id).copied();

    let mut evidence = Vec::new();
    for (field, _) in DECLARED_FIELDS {
        let value_a = a.and_then(|r| r.field(field)).map(String::from);
        let value_b = b.and_then(|r| r.field(field)).map(String::from);
        if value_a.is_none() && value_b.is_none() {
            continue;
        }
        evidence.push(FieldEvidence {
            field: (*field).to_string(),
            value_a,
            value_b,
        });
    }

    ReviewTask {
        task_key: task_key(&pair.record_a_id, &pair.record_b_id),
        record_a_id: pair.record_a_id.clone(),
        record_b_id: pair.record_b_id.clone(),
        match_probability: pair.match_probability,
        proposed: pair.classification,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(dataset: &str, id: &str, name: &str, email: Option<&str>) -> RawRecord {
        RawRecord {
            source_dataset: dataset.into(),
            source_record_id: id.into(),
            organization_name: Some(name.into()),
            email: email.map(String::from),
            phone: None,
            website: None,
            province: None,
            address: None,
            status: None,
            extensions: BTreeMap::new(),
            source_priority: None,
            quality_score: 1.0,
            observed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            group_key: None,
        }
    }

    #[test]
    fn task_key_is_order_independent() {
        assert_eq!(task_key("crm:1", "signups:9"), task_key("signups:9", "crm:1"));
        assert_ne!(task_key("crm:1", "signups:9"), task_key("crm:1", "signups:8"));
    }

    #[test]
    fn evidence_skips_fields_empty_on_both_sides() {
        let a = record("crm", "1", "Aero School", Some("a@x.com"));
        let b = record("signups", "9", "Aero School Inc", None);
        let mut lookup = BTreeMap::new();
        lookup.insert(a.qualified_id(), &a);
        lookup.insert(b.qualified_id(), &b);

        let pair = MatchPair {
            record_a_id: "crm:1".into(),
            record_b_id: "signups:9".into(),
            match_probability: 0.8,
            classification: Classification::Review,
        };
        let task = build_task(&pair, &lookup);

        let fields: Vec<&str> = task.evidence.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["organization_name", "email"]);

        let email = &task.evidence[1];
        assert_eq!(email.value_a.as_deref(), Some("a@x.com"));
        assert_eq!(email.value_b, None);
    }
}
