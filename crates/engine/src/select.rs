//! Field Selector — picks the winning value for one field from candidates
//! supplied by several source records.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;

use canonize_core::{FieldProvenance, RejectedValue};

/// One source record's value for a field, with the metadata the comparator
/// ranks on. `first_seen` is the record's position in the stable input
/// sequence, supplied by the caller — never an iteration order.
#[derive(Debug, Clone)]
pub struct FieldCandidate {
    pub value: Option<String>,
    pub source_dataset: String,
    pub source_record_id: String,
    pub source_priority: Option<i32>,
    pub quality_score: f64,
    pub observed_at: DateTime<Utc>,
    pub first_seen: usize,
}

/// Total, deterministic ranking: priority desc, quality desc, recency desc,
/// first-seen asc. The winner is the maximum. `first_seen` is unique per
/// candidate, so there are no true ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateRank {
    priority: i64,
    quality: OrderedFloat<f64>,
    observed_at: DateTime<Utc>,
    first_seen: Reverse<usize>,
}

impl CandidateRank {
    pub fn of(candidate: &FieldCandidate) -> Self {
        Self {
            // Missing priority ranks below any explicit priority.
            priority: candidate.source_priority.map(i64::from).unwrap_or(i64::MIN),
            quality: OrderedFloat(candidate.quality_score),
            observed_at: candidate.observed_at,
            first_seen: Reverse(candidate.first_seen),
        }
    }
}

/// Outcome of selecting one field: the winning value, its provenance, and
/// every non-null value that lost.
#[derive(Debug, Clone)]
pub struct Selection {
    pub value: String,
    pub provenance: FieldProvenance,
    pub rejected: Vec<RejectedValue>,
}

/// Pick the winning value for a field. Returns None when every candidate is
/// null or empty — in that case the canonical field stays null and carries
/// no provenance entry.
pub fn select_field(candidates: &[FieldCandidate]) -> Option<Selection> {
    let mut survivors: Vec<&FieldCandidate> = candidates
        .iter()
        .filter(|c| c.value.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .collect();

    if survivors.is_empty() {
        return None;
    }

    survivors.sort_by(|a, b| CandidateRank::of(b).cmp(&CandidateRank::of(a)));

    let winner = survivors[0];
    let rejected = survivors[1..]
        .iter()
        .map(|c| RejectedValue {
            value: c.value.clone().unwrap_or_default(),
            source_dataset: c.source_dataset.clone(),
        })
        .collect();

    Some(Selection {
        value: winner.value.clone().unwrap_or_default(),
        provenance: FieldProvenance {
            source_dataset: winner.source_dataset.clone(),
            source_record_id: winner.source_record_id.clone(),
            source_priority: winner.source_priority,
            quality_score: winner.quality_score,
            observed_at: winner.observed_at,
        },
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(
        value: Option<&str>,
        priority: Option<i32>,
        quality: f64,
        day: u32,
        first_seen: usize,
    ) -> FieldCandidate {
        FieldCandidate {
            value: value.map(String::from),
            source_dataset: format!("src{first_seen}"),
            source_record_id: format!("r{first_seen}"),
            source_priority: priority,
            quality_score: quality,
            observed_at: Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
            first_seen,
        }
    }

    #[test]
    fn null_candidates_dropped() {
        // Scenario B: a null value from a priority-5 source must not beat
        // real values from lower-priority sources.
        let candidates = vec![
            candidate(None, Some(5), 1.0, 1, 0),
            candidate(Some("Real Value"), Some(1), 0.5, 1, 1),
            candidate(Some("Other"), Some(1), 0.9, 1, 2),
        ];
        let selection = select_field(&candidates).unwrap();
        assert_eq!(selection.value, "Other");
        assert_eq!(selection.rejected.len(), 1);
        assert_eq!(selection.rejected[0].value, "Real Value");
    }

    #[test]
    fn all_null_yields_none() {
        let candidates = vec![
            candidate(None, Some(5), 1.0, 1, 0),
            candidate(Some("   "), Some(4), 1.0, 1, 1),
        ];
        assert!(select_field(&candidates).is_none());
    }

    #[test]
    fn priority_beats_quality() {
        let candidates = vec![
            candidate(Some("low-pri"), Some(1), 1.0, 1, 0),
            candidate(Some("high-pri"), Some(3), 0.1, 1, 1),
        ];
        assert_eq!(select_field(&candidates).unwrap().value, "high-pri");
    }

    #[test]
    fn missing_priority_ranks_last() {
        let candidates = vec![
            candidate(Some("no-pri"), None, 1.0, 9, 0),
            candidate(Some("pri-0"), Some(0), 0.1, 1, 1),
        ];
        assert_eq!(select_field(&candidates).unwrap().value, "pri-0");
    }

    #[test]
    fn recency_breaks_quality_tie() {
        let candidates = vec![
            candidate(Some("old"), Some(1), 0.8, 1, 0),
            candidate(Some("new"), Some(1), 0.8, 9, 1),
        ];
        assert_eq!(select_field(&candidates).unwrap().value, "new");
    }

    #[test]
    fn first_seen_breaks_full_tie() {
        let candidates = vec![
            candidate(Some("second"), Some(1), 0.8, 1, 7),
            candidate(Some("first"), Some(1), 0.8, 1, 2),
        ];
        let selection = select_field(&candidates).unwrap();
        assert_eq!(selection.value, "first");
        assert_eq!(selection.rejected[0].value, "second");
    }

    #[test]
    fn winner_is_pure_function_of_inputs() {
        // Physical ordering must not matter: first_seen is carried on the
        // candidate, not derived from position.
        let a = candidate(Some("alpha"), Some(2), 0.9, 3, 0);
        let b = candidate(Some("beta"), Some(2), 0.9, 3, 1);
        let c = candidate(Some("gamma"), Some(1), 1.0, 9, 2);

        let forward = select_field(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = select_field(&[c, b, a]).unwrap();
        assert_eq!(forward.value, backward.value);
        assert_eq!(forward.value, "alpha");
        assert_eq!(forward.provenance, backward.provenance);
    }

    #[test]
    fn provenance_reflects_winner() {
        let candidates = vec![
            candidate(Some("x"), Some(3), 0.7, 2, 0),
            candidate(Some("y"), Some(1), 0.9, 5, 1),
        ];
        let selection = select_field(&candidates).unwrap();
        assert_eq!(selection.provenance.source_dataset, "src0");
        assert_eq!(selection.provenance.source_priority, Some(3));
        assert_eq!(selection.provenance.quality_score, 0.7);
    }
}
