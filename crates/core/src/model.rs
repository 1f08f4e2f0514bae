use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The fixed field schema every source dataset is mapped into.
/// Order matters: completeness and per-field iteration follow this list.
pub const DECLARED_FIELDS: &[(&str, FieldKind)] = &[
    ("organization_name", FieldKind::Text),
    ("email", FieldKind::Email),
    ("phone", FieldKind::Phone),
    ("website", FieldKind::Url),
    ("province", FieldKind::Text),
    ("address", FieldKind::Text),
    ("status", FieldKind::Text),
];

/// Validation class for a declared field. Values that fail their kind's
/// check are coerced to null and conflict-logged, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Url,
}

/// A single normalized record from any source dataset. Immutable once
/// ingested — the pipeline only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_dataset: String,
    pub source_record_id: String,
    pub organization_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub province: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    /// Profile-specific columns that have no declared slot.
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
    pub source_priority: Option<i32>,
    /// Clamped to [0, 1] at ingestion.
    pub quality_score: f64,
    pub observed_at: DateTime<Utc>,
    /// Explicit grouping key supplied by the ingestion collaborator, if any.
    #[serde(default)]
    pub group_key: Option<String>,
}

impl RawRecord {
    /// Read a declared field by name. Unknown names return None.
    pub fn field(&self, name: &str) -> Option<&str> {
        let slot = match name {
            "organization_name" => &self.organization_name,
            "email" => &self.email,
            "phone" => &self.phone,
            "website" => &self.website,
            "province" => &self.province,
            "address" => &self.address,
            "status" => &self.status,
            _ => return None,
        };
        slot.as_deref()
    }

    /// Overwrite a declared field (used only by malformed-value coercion,
    /// which runs on a pipeline-local copy, never on ingested data).
    pub fn set_field(&mut self, name: &str, value: Option<String>) {
        match name {
            "organization_name" => self.organization_name = value,
            "email" => self.email = value,
            "phone" => self.phone = value,
            "website" => self.website = value,
            "province" => self.province = value,
            "address" => self.address = value,
            "status" => self.status = value,
            _ => {}
        }
    }

    /// Globally unique id of this record across all sources.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.source_dataset, self.source_record_id)
    }
}

// ---------------------------------------------------------------------------
// Canonical output
// ---------------------------------------------------------------------------

/// Per-field origin of the winning value. Exactly one entry per populated
/// field; null fields have no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub source_dataset: String,
    pub source_record_id: String,
    pub source_priority: Option<i32>,
    pub quality_score: f64,
    pub observed_at: DateTime<Utc>,
}

/// The merged, deduplicated representation of one real-world entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub group_key: String,
    /// Winning value per populated declared field.
    pub fields: BTreeMap<String, String>,
    pub provenance: BTreeMap<String, FieldProvenance>,
    pub source_datasets: BTreeSet<String>,
    pub source_record_ids: BTreeSet<String>,
    /// Fraction of declared fields that ended up populated.
    pub completeness: f64,
}

/// A non-winning, non-null candidate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedValue {
    pub value: String,
    pub source_dataset: String,
}

/// One conflict observed while merging a field. `winning_source` is None
/// when every candidate was null or malformed and the field ended null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub field: String,
    pub group_key: String,
    pub winning_source: Option<String>,
    pub rejected_values: Vec<RejectedValue>,
}

// ---------------------------------------------------------------------------
// Pair matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Match,
    Review,
    Reject,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Review => write!(f, "review"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// A scored candidate pair. Record ids are qualified (`dataset:id`) and
/// stored with `record_a_id < record_b_id` so pair identity is stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPair {
    pub record_a_id: String,
    pub record_b_id: String,
    pub match_probability: f64,
    pub classification: Classification,
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

/// Persisted, append-only outcome of human adjudication for a review-tier
/// pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub task_key: String,
    pub record_a_id: String,
    pub record_b_id: String,
    pub verdict: ReviewVerdict,
    #[serde(default)]
    pub reviewer: Option<String>,
    pub decided_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Entity registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: String,
    pub changed_at: DateTime<Utc>,
}

/// Durable identity for one entity across pipeline runs. `status_history`
/// is chronological and append-only; `entity_id` is never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRegistryEntry {
    pub entity_id: Uuid,
    pub organization_name: String,
    pub name_variants: BTreeSet<String>,
    pub status_history: Vec<StatusEntry>,
}

impl EntityRegistryEntry {
    pub fn current_status(&self) -> Option<&str> {
        self.status_history.last().map(|e| e.status.as_str())
    }
}
